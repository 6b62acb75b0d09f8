//! `dataset_record` encoding: the repeated unit inside a `PUSH_DATA` body.

use bytes::{Buf, BufMut, Bytes};

use crate::errors::{ProtocolError, Result};
use crate::mac::MacAddr;

/// One `source_mac | type | version | length | payload` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRecord {
    /// Hardware address of the dataset's original contributor.
    pub source_mac: MacAddr,
    /// Application-defined dataset type, 0-255.
    pub record_type: u8,
    /// Application-defined version, 0-255.
    pub version: u8,
    /// Opaque payload bytes.
    pub payload: Bytes,
}

impl DatasetRecord {
    /// Fixed header preceding the payload: mac(6) + type(1) + version(1) + length(2).
    pub const HEADER_SIZE: usize = 10;

    /// Total encoded size of this record.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        Self::HEADER_SIZE + self.payload.len()
    }

    /// Appends the record's wire form to `dst`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PayloadTooLarge`] if the payload does not fit
    /// in the 16-bit length field.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        let len = u16::try_from(self.payload.len())
            .map_err(|_| ProtocolError::PayloadTooLarge { size: self.payload.len(), max: usize::from(u16::MAX) })?;
        dst.put_slice(&self.source_mac.octets());
        dst.put_u8(self.record_type);
        dst.put_u8(self.version);
        dst.put_u16(len);
        dst.put_slice(&self.payload);
        Ok(())
    }

    /// Parses records left-to-right from `bytes` until fewer bytes remain
    /// than a record header needs, silently discarding that trailing
    /// remainder (per §4.1's "truncated tail tolerated" rule).
    #[must_use]
    pub fn decode_all(mut bytes: Bytes) -> Vec<Self> {
        let mut records = Vec::new();
        while bytes.len() >= Self::HEADER_SIZE {
            let mut mac = [0u8; 6];
            mac.copy_from_slice(&bytes[..6]);
            let source_mac = MacAddr::new(mac);
            let record_type = bytes[6];
            let version = bytes[7];
            let len = usize::from(u16::from_be_bytes([bytes[8], bytes[9]]));
            bytes.advance(Self::HEADER_SIZE);

            if bytes.len() < len {
                break;
            }
            let payload = bytes.split_to(len);
            records.push(Self { source_mac, record_type, version, payload });
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use bytes::{Bytes, BytesMut};

    use super::DatasetRecord;
    use crate::mac::MacAddr;

    fn sample(payload: &[u8]) -> DatasetRecord {
        DatasetRecord {
            source_mac: MacAddr::new([0xaa; 6]),
            record_type: 64,
            version: 1,
            payload: Bytes::copy_from_slice(payload),
        }
    }

    #[test]
    fn round_trips_single_record() {
        let record = sample(b"hello");
        let mut buf = BytesMut::new();
        record.encode(&mut buf).expect("fits in u16");
        let decoded = DatasetRecord::decode_all(buf.freeze());
        assert_eq!(decoded, vec![record]);
    }

    #[test]
    fn decodes_several_records_back_to_back() {
        let records = vec![sample(b"one"), sample(b"two-longer"), sample(b"")];
        let mut buf = BytesMut::new();
        for record in &records {
            record.encode(&mut buf).expect("fits in u16");
        }
        assert_eq!(DatasetRecord::decode_all(buf.freeze()), records);
    }

    #[test]
    fn truncated_tail_is_silently_discarded() {
        let record = sample(b"hello");
        let mut buf = BytesMut::new();
        record.encode(&mut buf).expect("fits in u16");
        buf.extend_from_slice(&[1, 2, 3]); // shorter than HEADER_SIZE
        let decoded = DatasetRecord::decode_all(buf.freeze());
        assert_eq!(decoded, vec![record]);
    }

    #[test]
    fn record_claiming_more_payload_than_available_is_dropped() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0xaa; 6]);
        buf.extend_from_slice(&[64, 1]);
        buf.extend_from_slice(&500u16.to_be_bytes());
        buf.extend_from_slice(b"short");
        assert_eq!(DatasetRecord::decode_all(buf.freeze()), Vec::new());
    }
}
