use std::io::{Read, Write};

use crate::protocol::{
    api_key::ApiKey,
    api_version::{ApiVersion, ApiVersionRange},
    error::Error as ApiError,
    traits::{ReadType, WriteType},
};

#[cfg(test)]
use proptest::prelude::*;

use super::{
    read_versioned_array, write_versioned_array, ReadVersionedError, ReadVersionedType,
    RequestBody, WriteVersionedError, WriteVersionedType,
};

/// Version 3 added `client_software_name`/`client_software_version`, but it
/// also moved the whole API to the flexible wire format -- out of scope
/// here (see the module docs on [`crate::protocol::messages`]), so this
/// request body stays empty across the versions this client speaks.
#[derive(Debug, PartialEq, Eq, Default)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct ApiVersionsRequest {}

impl<R> ReadVersionedType<R> for ApiVersionsRequest
where
    R: Read,
{
    fn read_versioned(_reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        if version.0 > 2 {
            return Err(ReadVersionedError::UnsupportedVersion { version });
        }
        Ok(Self {})
    }
}

impl<W> WriteVersionedType<W> for ApiVersionsRequest
where
    W: Write,
{
    fn write_versioned(
        &self,
        _writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        if version.0 > 2 {
            return Err(WriteVersionedError::UnsupportedVersion { version });
        }
        Ok(())
    }
}

impl RequestBody for ApiVersionsRequest {
    type ResponseBody = ApiVersionsResponse;
    const API_KEY: ApiKey = ApiKey::ApiVersions;
    const API_VERSION_RANGE: ApiVersionRange = ApiVersionRange::new(0, 2);
}

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct ApiVersionsResponseApiKey {
    pub api_key: ApiKey,
    pub min_version: ApiVersion,
    pub max_version: ApiVersion,
}

impl<R> ReadVersionedType<R> for ApiVersionsResponseApiKey
where
    R: Read,
{
    fn read_versioned(reader: &mut R, _version: ApiVersion) -> Result<Self, ReadVersionedError> {
        Ok(Self {
            api_key: i16::read(reader)?.into(),
            min_version: ApiVersion(i16::read(reader)?),
            max_version: ApiVersion(i16::read(reader)?),
        })
    }
}

impl<W> WriteVersionedType<W> for ApiVersionsResponseApiKey
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        _version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        let api_key: i16 = self.api_key.into();
        api_key.write(writer)?;
        self.min_version.0.write(writer)?;
        self.max_version.0.write(writer)?;
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct ApiVersionsResponse {
    #[cfg_attr(test, proptest(strategy = "any::<i16>().prop_map(|c| ApiError::new(c).unwrap())"))]
    pub error_code: Option<ApiError>,

    #[cfg_attr(
        test,
        proptest(strategy = "prop::collection::vec(any::<ApiVersionsResponseApiKey>(), 0..2)")
    )]
    pub api_keys: Vec<ApiVersionsResponseApiKey>,

    /// Added in version 1.
    pub throttle_time_ms: Option<i32>,
}

impl<R> ReadVersionedType<R> for ApiVersionsResponse
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        let v = version.0;

        let error_code = ApiError::new(i16::read(reader)?)?;
        let api_keys = read_versioned_array(reader, version)?.unwrap_or_default();
        let throttle_time_ms = (v >= 1).then(|| i32::read(reader)).transpose()?;

        Ok(Self {
            error_code,
            api_keys,
            throttle_time_ms,
        })
    }
}

impl<W> WriteVersionedType<W> for ApiVersionsResponse
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        let v = version.0;

        let err_code = self.error_code.map(|err| err.code()).unwrap_or(0);
        err_code.write(writer)?;

        write_versioned_array(writer, version, Some(&self.api_keys))?;

        if v >= 1 {
            self.throttle_time_ms.unwrap_or(0).write(writer)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::protocol::messages::test_utils::test_roundtrip_versioned;

    test_roundtrip_versioned!(
        ApiVersionsRequest,
        ApiVersionsRequest::API_VERSION_RANGE.min(),
        ApiVersionsRequest::API_VERSION_RANGE.max(),
        test_roundtrip_api_versions_request
    );

    test_roundtrip_versioned!(
        ApiVersionsResponse,
        ApiVersionsRequest::API_VERSION_RANGE.min(),
        ApiVersionsRequest::API_VERSION_RANGE.max(),
        test_roundtrip_api_versions_response
    );

    #[test]
    fn response() {
        for (name, version, want, data) in [
            (
                "no error",
                0,
                ApiVersionsResponse {
                    error_code: None,
                    api_keys: vec![ApiVersionsResponseApiKey {
                        api_key: ApiKey::Metadata,
                        min_version: ApiVersion(0x02),
                        max_version: ApiVersion(0x01),
                    }],
                    throttle_time_ms: None,
                },
                [
                    0x00, 0x00, // error code
                    0x00, 0x00, 0x00, 0x01, // api keys length
                    0x00, 0x03, // api key Metadata
                    0x00, 0x02, // min version
                    0x00, 0x01, // max version
                ]
                .as_ref(),
            ),
            (
                "with throttle",
                1,
                ApiVersionsResponse {
                    error_code: None,
                    api_keys: vec![],
                    throttle_time_ms: Some(42),
                },
                [
                    0x00, 0x00, // error code
                    0x00, 0x00, 0x00, 0x00, // no api keys
                    0x00, 0x00, 0x00, 0x2a, // throttle time
                ]
                .as_ref(),
            ),
        ] {
            let mut reader = Cursor::new(data);
            let got =
                ApiVersionsResponse::read_versioned(&mut reader, ApiVersion(version)).unwrap();
            assert_eq!(want, got, "{name}/{version}");
        }
    }
}
