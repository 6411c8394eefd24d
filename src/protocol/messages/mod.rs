//! Request/response message bodies.
//!
//! Every API this client speaks (`ApiVersions`, `Metadata`, `Produce`) stays
//! below the version where Kafka switches that API to the flexible,
//! tagged-fields wire format (`ApiVersions` v3+, `Metadata` v9+, `Produce`
//! v9+). So unlike a general-purpose client, there's no compact
//! string/array support or tagged fields anywhere in this module tree --
//! every message here uses the plain length-prefixed encodings from
//! [`crate::protocol::primitives`].

use std::io::{Read, Write};

use thiserror::Error;

use super::{
    api_key::ApiKey,
    api_version::{ApiVersion, ApiVersionRange},
    traits::{ReadError, ReadType, WriteError, WriteType},
};

pub mod api_versions;
pub mod header;
pub mod metadata;
pub mod produce;

#[cfg(test)]
pub(crate) mod test_utils;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReadVersionedError {
    #[error(transparent)]
    ReadError(#[from] ReadError),

    #[error("Unsupported API version: {version}")]
    UnsupportedVersion { version: ApiVersion },
}

pub trait ReadVersionedType<R>: Sized
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError>;
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteVersionedError {
    #[error(transparent)]
    WriteError(#[from] WriteError),

    #[error("Unsupported API version: {version}")]
    UnsupportedVersion { version: ApiVersion },

    #[error("Field `{field}` is not available in API version {version}")]
    FieldNotAvailable { version: ApiVersion, field: String },
}

pub trait WriteVersionedType<W>: Sized
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError>;
}

/// A request body, tagged with the API key and the version range this
/// client is able to speak for it.
pub trait RequestBody {
    type ResponseBody;

    const API_KEY: ApiKey;

    const API_VERSION_RANGE: ApiVersionRange;
}

/// Reads a version-dependent array: `-1` length means "absent" (`None`),
/// matching the nullable-array convention used throughout the protocol for
/// versioned message bodies.
pub fn read_versioned_array<R, T>(
    reader: &mut R,
    version: ApiVersion,
) -> Result<Option<Vec<T>>, ReadVersionedError>
where
    R: Read,
    T: ReadVersionedType<R>,
{
    let len = i32::read(reader)?;
    match len {
        -1 => Ok(None),
        l if l < -1 => Err(ReadVersionedError::ReadError(ReadError::Malformed(
            format!("Invalid negative array length: {l}").into(),
        ))),
        l => {
            let mut res = Vec::with_capacity(usize::try_from(l)?);
            for _ in 0..l {
                res.push(T::read_versioned(reader, version)?);
            }
            Ok(Some(res))
        }
    }
}

pub fn write_versioned_array<W, T>(
    writer: &mut W,
    version: ApiVersion,
    array: Option<&[T]>,
) -> Result<(), WriteVersionedError>
where
    W: Write,
    T: WriteVersionedType<W>,
{
    match array {
        Some(elements) => {
            let len = i32::try_from(elements.len()).map_err(WriteError::Overflow)?;
            len.write(writer)?;
            for element in elements {
                element.write_versioned(writer, version)?;
            }
        }
        None => {
            (-1i32).write(writer)?;
        }
    }
    Ok(())
}
