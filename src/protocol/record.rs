//! Record batch version 2 (the only record batch version Kafka brokers
//! still accept from a produce request on any remotely current broker).
//!
//! Layout, outermost to innermost:
//!
//! ```text
//! base_offset          INT64
//! batch_length         INT32  (bytes remaining after this field)
//! partition_leader_epoch INT32
//! magic                INT8   (always 2)
//! crc                  UINT32 (CRC-32C of everything from `attributes` on)
//! attributes           INT16
//! last_offset_delta     INT32
//! first_timestamp      INT64
//! max_timestamp        INT64
//! producer_id          INT64
//! producer_epoch       INT16
//! base_sequence        INT32
//! records_count        INT32
//! records              [Record]
//! ```
//!
//! `records_count` records follow, each individually length-prefixed with a
//! varint and internally varint-delimited (see [`Record`]).

use std::io::{Cursor, Read, Write};

use crc32c::crc32c;
#[cfg(test)]
use proptest::prelude::*;

use super::{
    primitives::Varint,
    traits::{ReadError, ReadType, WriteError, WriteType},
    vec_builder::VecBuilder,
};

/// Bytes remaining, after `batch_length` itself, up to the start of the
/// record payload: `partition_leader_epoch` (4) + `magic` (1) + `crc` (4).
const BATCH_HEADER_AFTER_LENGTH_FIELD: i32 = 9;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum RecordBatchCompression {
    NoCompression,
    Gzip,
    Snappy,
    Lz4,
    Zstd,
}

impl RecordBatchCompression {
    fn from_bits(bits: i16) -> Result<Self, ReadError> {
        Ok(match bits & 0x07 {
            0 => Self::NoCompression,
            1 => Self::Gzip,
            2 => Self::Snappy,
            3 => Self::Lz4,
            4 => Self::Zstd,
            other => {
                return Err(ReadError::Malformed(
                    format!("Unknown record batch compression type: {other}").into(),
                ))
            }
        })
    }

    fn to_bits(self) -> i16 {
        match self {
            Self::NoCompression => 0,
            Self::Gzip => 1,
            Self::Snappy => 2,
            Self::Lz4 => 3,
            Self::Zstd => 4,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum RecordBatchTimestampType {
    CreateTime,
    LogAppendTime,
}

#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct Record {
    pub timestamp_delta: i32,
    pub offset_delta: i32,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    #[cfg_attr(
        test,
        proptest(strategy = "prop::collection::vec(any::<(String, Option<Vec<u8>>)>(), 0..2)")
    )]
    pub headers: Vec<(String, Option<Vec<u8>>)>,
}

impl<R> ReadType<R> for Record
where
    R: Read,
{
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let len = Varint::read(reader)?.0;
        if len < 0 {
            return Err(ReadError::Malformed(
                format!("Invalid negative record length: {len}").into(),
            ));
        }
        let len = usize::try_from(len)?;
        let mut body = VecBuilder::new(len);
        body = body.read_exact(reader)?;
        let body: Vec<u8> = body.into();
        let mut body = Cursor::new(body);

        // attributes: always 0 for record-level attributes (batch-level
        // attributes carry compression/timestamp/control/transactional).
        let _attributes = i8::read(&mut body)?;
        let timestamp_delta = Varint::read(&mut body)?.0;
        let offset_delta = Varint::read(&mut body)?.0;
        let key = read_record_bytes(&mut body)?;
        let value = read_record_bytes(&mut body)?;

        let header_count = Varint::read(&mut body)?.0;
        if header_count < 0 {
            return Err(ReadError::Malformed(
                format!("Invalid negative header count: {header_count}").into(),
            ));
        }
        let mut headers = VecBuilder::new(usize::try_from(header_count)?);
        for _ in 0..header_count {
            let key_len = Varint::read(&mut body)?.0;
            let key_len = usize::try_from(key_len)
                .map_err(|_| ReadError::Malformed("Invalid header key length".into()))?;
            let mut key_buf = VecBuilder::new(key_len);
            key_buf = key_buf.read_exact(&mut body)?;
            let key_buf: Vec<u8> = key_buf.into();
            let header_key =
                String::from_utf8(key_buf).map_err(|e| ReadError::Malformed(Box::new(e)))?;

            let header_value = read_record_bytes(&mut body)?;
            headers.push((header_key, header_value));
        }

        Ok(Self {
            timestamp_delta,
            offset_delta,
            key,
            value,
            headers: headers.into(),
        })
    }
}

impl<W> WriteType<W> for Record
where
    W: Write,
{
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        let mut body = Vec::new();
        0i8.write(&mut body)?;
        Varint(self.timestamp_delta).write(&mut body)?;
        Varint(self.offset_delta).write(&mut body)?;
        write_record_bytes(&self.key, &mut body)?;
        write_record_bytes(&self.value, &mut body)?;

        Varint(i32::try_from(self.headers.len()).map_err(WriteError::Overflow)?)
            .write(&mut body)?;
        for (key, value) in &self.headers {
            Varint(i32::try_from(key.len()).map_err(WriteError::Overflow)?).write(&mut body)?;
            body.write_all(key.as_bytes())?;
            write_record_bytes(value, &mut body)?;
        }

        Varint(i32::try_from(body.len()).map_err(WriteError::Overflow)?).write(writer)?;
        writer.write_all(&body)?;
        Ok(())
    }
}

fn read_record_bytes<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>, ReadError> {
    let len = Varint::read(reader)?.0;
    match len {
        -1 => Ok(None),
        l if l < -1 => Err(ReadError::Malformed(
            format!("Invalid negative length in record: {l}").into(),
        )),
        l => {
            let mut buf = VecBuilder::new(usize::try_from(l)?);
            buf = buf.read_exact(reader)?;
            Ok(Some(buf.into()))
        }
    }
}

fn write_record_bytes<W: Write>(value: &Option<Vec<u8>>, writer: &mut W) -> Result<(), WriteError> {
    match value {
        Some(bytes) => {
            Varint(i32::try_from(bytes.len()).map_err(WriteError::Overflow)?).write(writer)?;
            writer.write_all(bytes)?;
        }
        None => {
            Varint(-1).write(writer)?;
        }
    }
    Ok(())
}

/// Either a regular data batch or a control batch (the latter is only ever
/// produced by the broker itself, e.g. to mark a transaction commit/abort;
/// this client never writes one, but decoding it is part of the wire
/// format contract).
#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum ControlBatchOrRecords {
    Records(Vec<Record>),
    ControlBatch, // body intentionally not modeled; never produced by this client
}

#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct RecordBatch {
    pub base_offset: i64,
    /// Broker-assigned; the producer always writes `-1` here.
    pub partition_leader_epoch: i32,
    pub last_offset_delta: i32,
    pub first_timestamp: i64,
    pub max_timestamp: i64,
    /// Always `-1`: this client never manages a producer id (see the
    /// exactly-once non-goal).
    pub producer_id: i64,
    /// Always `-1`.
    pub producer_epoch: i16,
    /// Always `-1`.
    pub base_sequence: i32,
    pub records: ControlBatchOrRecords,
    pub compression: RecordBatchCompression,
    pub is_transactional: bool,
    pub timestamp_type: RecordBatchTimestampType,
}

impl<R> ReadType<R> for RecordBatch
where
    R: Read,
{
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let base_offset = i64::read(reader)?;
        let batch_length = i32::read(reader)?;
        if batch_length < BATCH_HEADER_AFTER_LENGTH_FIELD {
            return Err(ReadError::Malformed(
                format!("Record batch length too small: {batch_length}").into(),
            ));
        }
        let partition_leader_epoch = i32::read(reader)?;

        let magic = i8::read(reader)?;
        if magic != 2 {
            return Err(ReadError::Malformed(
                format!("Unsupported record batch magic byte: {magic}").into(),
            ));
        }

        let mut crc_buf = [0u8; 4];
        reader.read_exact(&mut crc_buf)?;
        let crc = u32::from_be_bytes(crc_buf);

        let payload_len = batch_length - BATCH_HEADER_AFTER_LENGTH_FIELD;
        let mut payload = VecBuilder::new(usize::try_from(payload_len)?);
        payload = payload.read_exact(reader)?;
        let payload: Vec<u8> = payload.into();

        let computed_crc = crc32c(&payload);
        if computed_crc != crc {
            return Err(ReadError::Malformed(
                format!(
                    "Record batch CRC mismatch: expected {crc:#010x}, computed {computed_crc:#010x}"
                )
                .into(),
            ));
        }

        let mut payload = Cursor::new(payload);
        let attributes = i16::read(&mut payload)?;
        let compression = RecordBatchCompression::from_bits(attributes)?;
        let timestamp_type = if attributes & 0x08 != 0 {
            RecordBatchTimestampType::LogAppendTime
        } else {
            RecordBatchTimestampType::CreateTime
        };
        let is_transactional = attributes & 0x10 != 0;
        let is_control = attributes & 0x20 != 0;

        let last_offset_delta = i32::read(&mut payload)?;
        let first_timestamp = i64::read(&mut payload)?;
        let max_timestamp = i64::read(&mut payload)?;
        let producer_id = i64::read(&mut payload)?;
        let producer_epoch = i16::read(&mut payload)?;
        let base_sequence = i32::read(&mut payload)?;

        let records_count = i32::read(&mut payload)?;
        if records_count < 0 {
            return Err(ReadError::Malformed(
                format!("Invalid negative record count: {records_count}").into(),
            ));
        }

        let records = if is_control {
            for _ in 0..records_count {
                let _ = Record::read(&mut payload)?;
            }
            ControlBatchOrRecords::ControlBatch
        } else {
            let mut records = VecBuilder::new(usize::try_from(records_count)?);
            for _ in 0..records_count {
                records.push(Record::read(&mut payload)?);
            }
            ControlBatchOrRecords::Records(records.into())
        };

        Ok(Self {
            base_offset,
            partition_leader_epoch,
            last_offset_delta,
            first_timestamp,
            max_timestamp,
            producer_id,
            producer_epoch,
            base_sequence,
            records,
            compression,
            is_transactional,
            timestamp_type,
        })
    }
}

impl<W> WriteType<W> for RecordBatch
where
    W: Write,
{
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        let mut attributes: i16 = self.compression.to_bits();
        if matches!(self.timestamp_type, RecordBatchTimestampType::LogAppendTime) {
            attributes |= 0x08;
        }
        if self.is_transactional {
            attributes |= 0x10;
        }
        let is_control = matches!(self.records, ControlBatchOrRecords::ControlBatch);
        if is_control {
            attributes |= 0x20;
        }

        let mut payload = Vec::new();
        attributes.write(&mut payload)?;
        self.last_offset_delta.write(&mut payload)?;
        self.first_timestamp.write(&mut payload)?;
        self.max_timestamp.write(&mut payload)?;
        self.producer_id.write(&mut payload)?;
        self.producer_epoch.write(&mut payload)?;
        self.base_sequence.write(&mut payload)?;

        match &self.records {
            ControlBatchOrRecords::Records(records) => {
                let count = i32::try_from(records.len()).map_err(WriteError::Overflow)?;
                count.write(&mut payload)?;
                for record in records {
                    record.write(&mut payload)?;
                }
            }
            ControlBatchOrRecords::ControlBatch => {
                0i32.write(&mut payload)?;
            }
        }

        let crc = crc32c(&payload);

        self.base_offset.write(writer)?;
        let batch_length = i32::try_from(payload.len())
            .map_err(WriteError::Overflow)?
            + BATCH_HEADER_AFTER_LENGTH_FIELD;
        batch_length.write(writer)?;
        self.partition_leader_epoch.write(writer)?;
        2i8.write(writer)?;
        writer.write_all(&crc.to_be_bytes())?;
        writer.write_all(&payload)?;

        Ok(())
    }
}

/// Builds the single batch a Produce request sends for one partition's
/// worth of records, stamping the fields this client never manages
/// (`producer_id`/`producer_epoch`/`base_sequence`/`partition_leader_epoch`)
/// with their sentinel `-1` values.
pub fn build_batch(base_offset: i64, records: Vec<Record>) -> RecordBatch {
    let last_offset_delta = records
        .last()
        .map(|r| r.offset_delta)
        .unwrap_or(0);
    let first_timestamp = records.first().map(|r| r.timestamp_delta as i64).unwrap_or(0);
    let max_timestamp = records
        .iter()
        .map(|r| r.timestamp_delta as i64)
        .max()
        .unwrap_or(0)
        + first_timestamp;

    RecordBatch {
        base_offset,
        partition_leader_epoch: -1,
        last_offset_delta,
        first_timestamp,
        max_timestamp,
        producer_id: -1,
        producer_epoch: -1,
        base_sequence: -1,
        records: ControlBatchOrRecords::Records(records),
        compression: RecordBatchCompression::NoCompression,
        is_transactional: false,
        timestamp_type: RecordBatchTimestampType::CreateTime,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn decodes_the_canonical_single_record_batch() {
        // base_offset=4, partition_leader_epoch=0, magic=2, NO_COMPRESSION,
        // CreateTime, transactional, base_sequence=3, one record with key/value "4".
        let bytes: Vec<u8> = vec![
            0, 0, 0, 0, 0, 0, 0, 4, // base_offset = 4
            0, 0, 0, 0x3a, // batch_length = 58
            0, 0, 0, 0, // partition_leader_epoch
            2, // magic
            0x6f, 0x51, 0x95, 0x17, // crc
            0, 0x10, // attributes: NO_COMPRESSION | CreateTime | transactional
            0, 0, 0, 0, // last_offset_delta
            0, 0, 1, 0x6e, 0xb3, 0x2b, 0x03, 0x41, // first_timestamp
            0, 0, 1, 0x6e, 0xb3, 0x2b, 0x03, 0x41, // max_timestamp
            0, 0, 0, 0, 0, 0, 0, 0, // producer_id
            0, 0, // producer_epoch
            0, 0, 0, 3, // base_sequence
            0, 0, 0, 1, // records_count
            // record: length=16 (zigzag 8), attrs=0, ts_delta=0, offset_delta=0, key="4", value="4", 0 headers
            0x10, 0, 0, 0, 2, b'4', 2, b'4', 0,
        ];

        let batch = RecordBatch::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(batch.base_offset, 4);
        assert_eq!(batch.base_sequence, 3);
        assert!(batch.is_transactional);
        assert_eq!(batch.compression, RecordBatchCompression::NoCompression);
        match &batch.records {
            ControlBatchOrRecords::Records(records) => {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].key, Some(b"4".to_vec()));
                assert_eq!(records[0].value, Some(b"4".to_vec()));
            }
            ControlBatchOrRecords::ControlBatch => panic!("expected a data batch"),
        }
    }

    #[test]
    fn wrong_magic_byte_is_a_parse_error() {
        let mut bytes = vec![0u8; 8 + 4 + 4];
        bytes.push(1); // magic
        bytes.extend_from_slice(&[0u8; 4]); // crc
        let err = RecordBatch::read(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, ReadError::Malformed(_)));
    }

    #[test]
    fn corrupted_payload_fails_crc_check() {
        let batch = build_batch(
            0,
            vec![Record {
                timestamp_delta: 0,
                offset_delta: 0,
                key: Some(b"k".to_vec()),
                value: Some(b"v".to_vec()),
                headers: vec![],
            }],
        );
        let mut bytes = Vec::new();
        batch.write(&mut bytes).unwrap();

        // flip a bit deep in the payload, well after the crc field
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;

        let err = RecordBatch::read(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, ReadError::Malformed(_)));
    }

    #[test]
    fn round_trips_through_write_then_read() {
        let batch = build_batch(
            7,
            vec![
                Record {
                    timestamp_delta: 0,
                    offset_delta: 0,
                    key: None,
                    value: Some(b"hello".to_vec()),
                    headers: vec![("trace-id".to_string(), Some(b"abc".to_vec()))],
                },
                Record {
                    timestamp_delta: 5,
                    offset_delta: 1,
                    key: Some(b"k2".to_vec()),
                    value: Some(b"world".to_vec()),
                    headers: vec![],
                },
            ],
        );

        let mut bytes = Vec::new();
        batch.write(&mut bytes).unwrap();
        let restored = RecordBatch::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(batch, restored);
    }
}
