//! `Produce` request/response, API key 0, versions 2 through 8.
//!
//! Version 2 is the oldest version that uses record batch v2 (the only
//! batch format this client ever writes); versions below that assumed the
//! v0/v1 message-set format and are out of scope.

use std::io::{Read, Write};

use super::{
    read_versioned_array, write_versioned_array, ReadVersionedError, ReadVersionedType,
    RequestBody, WriteVersionedError, WriteVersionedType,
};
use crate::protocol::{
    api_key::ApiKey,
    api_version::{ApiVersion, ApiVersionRange},
    error::Error,
    primitives::Records,
    traits::{ReadType, WriteType},
};

#[cfg(test)]
use proptest::prelude::*;

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct ProduceRequest {
    /// Always `None`: see the exactly-once/transactions non-goal.
    ///
    /// Added in version 3.
    pub transactional_id: Option<String>,

    pub acks: i16,

    pub timeout_ms: i32,

    pub topics: Vec<ProduceRequestTopic>,
}

impl RequestBody for ProduceRequest {
    type ResponseBody = ProduceResponse;

    const API_KEY: ApiKey = ApiKey::Produce;

    const API_VERSION_RANGE: ApiVersionRange = ApiVersionRange::new(2, 8);
}

impl<W> WriteVersionedType<W> for ProduceRequest
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        let v = version.0;

        if v >= 3 {
            self.transactional_id.write(writer)?;
        } else if self.transactional_id.is_some() {
            return Err(WriteVersionedError::FieldNotAvailable {
                version,
                field: "transactional_id".to_string(),
            });
        }

        self.acks.write(writer)?;
        self.timeout_ms.write(writer)?;
        write_versioned_array(writer, version, Some(&self.topics))?;

        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct ProduceRequestTopic {
    pub name: String,
    pub partitions: Vec<ProduceRequestPartition>,
}

impl<W> WriteVersionedType<W> for ProduceRequestTopic
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        self.name.write(writer)?;
        write_versioned_array(writer, version, Some(&self.partitions))?;
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct ProduceRequestPartition {
    pub partition_index: i32,
    pub records: Records,
}

impl<W> WriteVersionedType<W> for ProduceRequestPartition
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        _version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        self.partition_index.write(writer)?;
        self.records.write(writer)?;
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct ProduceResponse {
    pub topics: Vec<ProduceResponseTopic>,

    /// Added in version 1.
    pub throttle_time_ms: Option<i32>,
}

impl<R> ReadVersionedType<R> for ProduceResponse
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        let v = version.0;

        let topics = read_versioned_array(reader, version)?.unwrap_or_default();
        let throttle_time_ms = (v >= 1).then(|| i32::read(reader)).transpose()?;

        Ok(Self {
            topics,
            throttle_time_ms,
        })
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct ProduceResponseTopic {
    pub name: String,
    pub partitions: Vec<ProduceResponsePartition>,
}

impl<R> ReadVersionedType<R> for ProduceResponseTopic
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        Ok(Self {
            name: String::read(reader)?,
            partitions: read_versioned_array(reader, version)?.unwrap_or_default(),
        })
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct ProduceResponsePartition {
    pub partition_index: i32,
    pub error: Option<Error>,
    pub base_offset: i64,

    /// `-1` unless the broker has `LogAppendTime` configured for the
    /// topic. Added in version 2.
    pub log_append_time_ms: Option<i64>,

    /// Added in version 5.
    pub log_start_offset: Option<i64>,

    /// Per-batch-index errors, e.g. when one record in a batch is rejected
    /// for being too large while its siblings are accepted.
    ///
    /// Added in version 8.
    pub record_errors: Vec<ProduceResponseRecordError>,

    /// Added in version 8.
    pub error_message: Option<String>,
}

impl<R> ReadVersionedType<R> for ProduceResponsePartition
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        let v = version.0;

        let partition_index = i32::read(reader)?;
        let error = Error::new(i16::read(reader)?)?;
        let base_offset = i64::read(reader)?;
        let log_append_time_ms = (v >= 2).then(|| i64::read(reader)).transpose()?;
        let log_start_offset = (v >= 5).then(|| i64::read(reader)).transpose()?;

        let (record_errors, error_message) = if v >= 8 {
            (
                read_versioned_array(reader, version)?.unwrap_or_default(),
                Option::<String>::read(reader)?,
            )
        } else {
            (vec![], None)
        };

        Ok(Self {
            partition_index,
            error,
            base_offset,
            log_append_time_ms,
            log_start_offset,
            record_errors,
            error_message,
        })
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct ProduceResponseRecordError {
    pub batch_index: i32,
    pub batch_index_error_message: Option<String>,
}

impl<R> ReadVersionedType<R> for ProduceResponseRecordError
where
    R: Read,
{
    fn read_versioned(reader: &mut R, _version: ApiVersion) -> Result<Self, ReadVersionedError> {
        Ok(Self {
            batch_index: i32::read(reader)?,
            batch_index_error_message: Option::<String>::read(reader)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::protocol::messages::test_utils::test_roundtrip_versioned;
    use crate::protocol::primitives::Records;
    use crate::protocol::record::{
        build_batch, ControlBatchOrRecords, Record, RecordBatch, RecordBatchCompression,
        RecordBatchTimestampType,
    };

    test_roundtrip_versioned!(
        ProduceResponse,
        ProduceRequest::API_VERSION_RANGE.min(),
        ProduceRequest::API_VERSION_RANGE.max(),
        test_roundtrip_produce_response
    );

    #[test]
    fn request_v7() {
        let req = ProduceRequest {
            transactional_id: None,
            acks: 1,
            timeout_ms: 1500,
            topics: vec![ProduceRequestTopic {
                name: "topic1".to_string(),
                partitions: vec![ProduceRequestPartition {
                    partition_index: 0,
                    records: Records(vec![build_batch(0, vec![])]),
                }],
            }],
        };

        let mut buf = Vec::new();
        req.write_versioned(&mut buf, ApiVersion(7)).unwrap();

        // v7 >= 3, so a null transactional_id (-1i16) precedes acks.
        assert_eq!(&buf[0..2], &(-1i16).to_be_bytes());
        assert_eq!(&buf[2..4], &1i16.to_be_bytes());
        assert_eq!(&buf[4..8], &1500i32.to_be_bytes());
    }

    #[test]
    fn writes_a_single_record_batch_to_the_canonical_wire_bytes() {
        // One record ("0" -> "0") in topic "test5", partition 0, acks=-1,
        // timeout=30000ms, written at v7. Field values and expected output
        // match a known-good encoding of this exact request.
        let batch = RecordBatch {
            base_offset: 0,
            partition_leader_epoch: -1,
            last_offset_delta: 0,
            first_timestamp: 0x16e5b6eba2c,
            max_timestamp: 0x16e5b6eba2c,
            producer_id: -1,
            producer_epoch: -1,
            base_sequence: -1,
            records: ControlBatchOrRecords::Records(vec![Record {
                timestamp_delta: 0,
                offset_delta: 0,
                key: Some(b"0".to_vec()),
                value: Some(b"0".to_vec()),
                headers: vec![],
            }]),
            compression: RecordBatchCompression::NoCompression,
            is_transactional: false,
            timestamp_type: RecordBatchTimestampType::CreateTime,
        };

        let req = ProduceRequest {
            transactional_id: None,
            acks: -1,
            timeout_ms: 30000,
            topics: vec![ProduceRequestTopic {
                name: "test5".to_string(),
                partitions: vec![ProduceRequestPartition {
                    partition_index: 0,
                    records: Records(vec![batch]),
                }],
            }],
        };

        let mut buf = Vec::new();
        req.write_versioned(&mut buf, ApiVersion(7)).unwrap();

        #[rustfmt::skip]
        let want: Vec<u8> = vec![
            0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x75, 0x30, 0x00, 0x00, 0x00, 0x01, 0x00, 0x05, 0x74, 0x65,
            0x73, 0x74, 0x35, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x3a, 0xff, 0xff, 0xff, 0xff, 0x02,
            0x06, 0x76, 0x5e, 0x6f, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x6e, 0x5b, 0x6e,
            0xba, 0x2c, 0x00, 0x00, 0x01, 0x6e, 0x5b, 0x6e, 0xba, 0x2c, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x01, 0x10, 0x00, 0x00, 0x00,
            0x02, 0x30, 0x02, 0x30, 0x00,
        ];

        assert_eq!(buf, want);
    }

    #[test]
    fn response_v0_single_partition() {
        let data: Vec<u8> = {
            let mut buf = Vec::new();
            1i32.write(&mut buf).unwrap(); // 1 topic
            "topic1".to_string().write(&mut buf).unwrap();
            1i32.write(&mut buf).unwrap(); // 1 partition
            0i32.write(&mut buf).unwrap(); // partition_index
            0i16.write(&mut buf).unwrap(); // error_code = NONE
            42i64.write(&mut buf).unwrap(); // base_offset
            buf
        };

        let got = ProduceResponse::read_versioned(&mut Cursor::new(data), ApiVersion(0)).unwrap();
        assert_eq!(got.topics.len(), 1);
        assert_eq!(got.topics[0].partitions[0].base_offset, 42);
        assert!(got.topics[0].partitions[0].error.is_none());
        assert_eq!(got.topics[0].partitions[0].log_append_time_ms, None);
    }
}
