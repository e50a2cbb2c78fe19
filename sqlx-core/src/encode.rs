//! Provides [`Encode`] for encoding values for the database.

use std::mem;

use crate::database::{Database, HasArguments};
use crate::error::BoxDynError;

/// The return type of [Encode::encode].
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsNull {
    /// The value is null; no data was written.
    Yes,

    /// The value is not null.
    ///
    /// This does not mean that data was written.
    No,
}

/// Encode a single value to be sent to the database.
pub trait Encode<'q, DB: Database> {
    /// Writes the value of `self` into `buf` in the expected format for the database.
    #[must_use]
    fn encode(
        self,
        buf: &mut <DB as HasArguments<'q>>::ArgumentBuffer,
    ) -> Result<IsNull, BoxDynError>
    where
        Self: Sized,
    {
        self.encode_by_ref(buf)
    }

    /// Writes the value of `self` into `buf` without moving `self`.
    ///
    /// Where possible, make use of `encode` instead as it can take advantage of re-using
    /// memory.
    fn encode_by_ref(
        &self,
        buf: &mut <DB as HasArguments<'q>>::ArgumentBuffer,
    ) -> Result<IsNull, BoxDynError>;

    /// The SQL type the value is sent as, when it differs from
    /// [`Type::type_info`](crate::types::Type::type_info).
    fn produces(&self) -> Option<DB::TypeInfo> {
        // `produces` is inherently a hook to allow database drivers to produce value-dependent
        // type information; if the driver doesn't need this, it can leave this as `None`
        None
    }

    #[inline]
    fn size_hint(&self) -> usize {
        mem::size_of_val(self)
    }
}

impl<'q, T, DB> Encode<'q, DB> for Option<T>
where
    DB: Database,
    T: Encode<'q, DB>,
{
    #[inline]
    fn produces(&self) -> Option<DB::TypeInfo> {
        if let Some(v) = self {
            v.produces()
        } else {
            None
        }
    }

    #[inline]
    fn encode(
        self,
        buf: &mut <DB as HasArguments<'q>>::ArgumentBuffer,
    ) -> Result<IsNull, BoxDynError> {
        if let Some(v) = self {
            v.encode(buf)
        } else {
            Ok(IsNull::Yes)
        }
    }

    #[inline]
    fn encode_by_ref(
        &self,
        buf: &mut <DB as HasArguments<'q>>::ArgumentBuffer,
    ) -> Result<IsNull, BoxDynError> {
        if let Some(v) = self {
            v.encode_by_ref(buf)
        } else {
            Ok(IsNull::Yes)
        }
    }

    #[inline]
    fn size_hint(&self) -> usize {
        self.as_ref().map_or(0, Encode::size_hint)
    }
}
