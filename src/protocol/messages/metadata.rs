use std::io::{Read, Write};

use super::{
    read_versioned_array, write_versioned_array, ReadVersionedError, ReadVersionedType,
    RequestBody, WriteVersionedError, WriteVersionedType,
};
use crate::protocol::api_version::ApiVersionRange;
use crate::protocol::{
    api_key::ApiKey,
    api_version::ApiVersion,
    error::Error,
    traits::{ReadType, WriteType},
};

#[cfg(test)]
use proptest::prelude::*;

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct MetadataRequest {
    /// The topics to fetch metadata for. `None` requests data for every
    /// topic in the cluster.
    pub topics: Option<Vec<MetadataRequestTopic>>,

    /// If true, the broker may auto-create topics that were requested but
    /// don't exist yet, if it's configured to do so.
    ///
    /// Added in version 4.
    pub allow_auto_topic_creation: Option<bool>,

    /// Added in version 8. Always written as `false`: this client never
    /// asks for ACL metadata.
    ///
    /// Added in version 8.
    pub include_cluster_authorized_operations: Option<bool>,

    /// Added in version 8. Always written as `false`.
    pub include_topic_authorized_operations: Option<bool>,
}

impl RequestBody for MetadataRequest {
    type ResponseBody = MetadataResponse;

    const API_KEY: ApiKey = ApiKey::Metadata;

    const API_VERSION_RANGE: ApiVersionRange = ApiVersionRange::new(1, 8);
}

impl<W> WriteVersionedType<W> for MetadataRequest
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        let v = version.0;

        if v < 4 && self.allow_auto_topic_creation.is_some() {
            return Err(WriteVersionedError::FieldNotAvailable {
                version,
                field: "allow_auto_topic_creation".to_string(),
            });
        }

        write_versioned_array(writer, version, self.topics.as_deref())?;

        if v >= 4 {
            match self.allow_auto_topic_creation {
                // the default behaviour is to allow topic creation
                None => true.write(writer)?,
                Some(b) => b.write(writer)?,
            }
        }

        if v >= 8 {
            self.include_cluster_authorized_operations
                .unwrap_or(false)
                .write(writer)?;
            self.include_topic_authorized_operations
                .unwrap_or(false)
                .write(writer)?;
        }

        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct MetadataRequestTopic {
    pub name: String,
}

impl<W> WriteVersionedType<W> for MetadataRequestTopic
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        _version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        Ok(self.name.write(writer)?)
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct MetadataResponse {
    /// Added in version 3.
    pub throttle_time_ms: Option<i32>,

    pub brokers: Vec<MetadataResponseBroker>,

    /// Added in version 2.
    pub cluster_id: Option<String>,

    /// Added in version 1.
    pub controller_id: Option<i32>,

    pub topics: Vec<MetadataResponseTopic>,
}

impl<R> ReadVersionedType<R> for MetadataResponse
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        let v = version.0;

        let throttle_time_ms = (v >= 3).then(|| i32::read(reader)).transpose()?;
        let brokers = read_versioned_array(reader, version)?.unwrap_or_default();
        let cluster_id = if v >= 2 {
            Option::<String>::read(reader)?
        } else {
            None
        };
        let controller_id = (v >= 1).then(|| i32::read(reader)).transpose()?;
        let topics = read_versioned_array(reader, version)?.unwrap_or_default();

        // v8 appends cluster_authorized_operations (INT32); this client
        // never requests it, but must still consume it if present so the
        // stream stays aligned for the next response.
        if v >= 8 {
            let _ = i32::read(reader)?;
        }

        Ok(Self {
            throttle_time_ms,
            brokers,
            topics,
            cluster_id,
            controller_id,
        })
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct MetadataResponseBroker {
    pub node_id: i32,
    pub host: String,
    pub port: i32,
    /// Added in version 1.
    pub rack: Option<String>,
}

impl<R> ReadVersionedType<R> for MetadataResponseBroker
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        let v = version.0;

        let node_id = i32::read(reader)?;
        let host = String::read(reader)?;
        let port = i32::read(reader)?;
        let rack = if v >= 1 {
            Option::<String>::read(reader)?
        } else {
            None
        };

        Ok(Self {
            node_id,
            host,
            port,
            rack,
        })
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct MetadataResponseTopic {
    pub error: Option<Error>,
    pub name: String,
    /// Added in version 1.
    pub is_internal: Option<bool>,
    pub partitions: Vec<MetadataResponsePartition>,
}

impl<R> ReadVersionedType<R> for MetadataResponseTopic
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        let v = version.0;

        let error = Error::new(i16::read(reader)?)?;
        let name = String::read(reader)?;
        let is_internal = (v >= 1).then(|| bool::read(reader)).transpose()?;
        let partitions = read_versioned_array(reader, version)?.unwrap_or_default();

        // v8 appends topic_authorized_operations (INT32); see the note in
        // MetadataResponse::read_versioned.
        if v >= 8 {
            let _ = i32::read(reader)?;
        }

        Ok(Self {
            error,
            name,
            is_internal,
            partitions,
        })
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct MetadataResponsePartition {
    pub error: Option<Error>,
    pub partition_index: i32,
    pub leader_id: i32,
    /// Added in version 7.
    pub leader_epoch: Option<i32>,
    pub replica_nodes: Vec<i32>,
    pub isr_nodes: Vec<i32>,
    /// Added in version 5.
    pub offline_replicas: Vec<i32>,
}

impl<R> ReadVersionedType<R> for MetadataResponsePartition
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        let v = version.0;

        let error = Error::new(i16::read(reader)?)?;
        let partition_index = i32::read(reader)?;
        let leader_id = i32::read(reader)?;
        let leader_epoch = (v >= 7).then(|| i32::read(reader)).transpose()?;
        let replica_nodes = Vec::<i32>::read(reader)?;
        let isr_nodes = Vec::<i32>::read(reader)?;
        let offline_replicas = if v >= 5 {
            Vec::<i32>::read(reader)?
        } else {
            vec![]
        };

        Ok(Self {
            error,
            partition_index,
            leader_id,
            leader_epoch,
            replica_nodes,
            isr_nodes,
            offline_replicas,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::protocol::messages::test_utils::test_roundtrip_versioned;

    test_roundtrip_versioned!(
        MetadataResponse,
        MetadataRequest::API_VERSION_RANGE.min(),
        MetadataRequest::API_VERSION_RANGE.max(),
        test_roundtrip_metadata_response
    );

    #[test]
    fn request() {
        for (name, version, req, want) in [
            (
                "one topic",
                1,
                MetadataRequest {
                    topics: Some(vec![MetadataRequestTopic {
                        name: "topic1".to_string(),
                    }]),
                    allow_auto_topic_creation: None,
                    include_cluster_authorized_operations: None,
                    include_topic_authorized_operations: None,
                },
                [
                    0x00, 0x00, 0x00, 0x01, 0x00, 0x06, b't', b'o', b'p', b'i', b'c', b'1',
                ]
                .as_ref(),
            ),
            (
                "auto create topic",
                4,
                MetadataRequest {
                    topics: Some(vec![MetadataRequestTopic {
                        name: "topic1".to_string(),
                    }]),
                    allow_auto_topic_creation: Some(true),
                    include_cluster_authorized_operations: None,
                    include_topic_authorized_operations: None,
                },
                [
                    0x00, 0x00, 0x00, 0x01, 0x00, 0x06, b't', b'o', b'p', b'i', b'c', b'1', 0x01,
                ]
                .as_ref(),
            ),
        ] {
            let mut buf = Cursor::new([0u8; 128]);
            req.write_versioned(&mut buf, ApiVersion(version)).unwrap();
            let len = buf.position() as usize;
            let got = &buf.get_ref().as_slice()[..len];
            assert_eq!(got, want, "{name}/{version}");
        }
    }

    #[test]
    fn response_v1() {
        let data: &[u8] = &[
            0x00, 0x00, 0x00, 0x00, // no brokers
            0x00, 0x00, 0x00, 0x00, // controller_id
            0x00, 0x00, 0x00, 0x00, // no topics
        ];
        let mut reader = Cursor::new(data);
        let got = MetadataResponse::read_versioned(&mut reader, ApiVersion(1)).unwrap();
        assert_eq!(
            got,
            MetadataResponse {
                throttle_time_ms: None,
                brokers: vec![],
                cluster_id: None,
                controller_id: Some(0),
                topics: vec![],
            }
        );
    }
}
