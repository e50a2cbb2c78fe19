use indexmap::IndexMap;
use serde::Serialize;

use crate::arguments::Arguments;
use crate::encode::{Encode, IsNull};
use crate::error::BoxDynError;
use crate::snowflake::Snowflake;
use crate::types::Type;

/// Implementation of [`Arguments`] for Snowflake.
#[derive(Debug, Default, Clone)]
pub struct SnowflakeArguments {
    // Snowflake binds positionally with text values; the declared type tells
    // the server how to read the text
    pub(crate) bindings: Vec<SnowflakeBinding>,
}

/// A single bind parameter as it is sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnowflakeBinding {
    #[serde(rename = "type")]
    pub(crate) binding_type: &'static str,
    pub(crate) value: Option<String>,
}

/// Implementation of [`ArgumentBuffer`] for Snowflake.
///
/// [`ArgumentBuffer`]: crate::database::HasArguments::ArgumentBuffer
#[derive(Debug, Default)]
pub struct SnowflakeArgumentBuffer {
    pub(crate) buffer: String,
}

impl SnowflakeArguments {
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    pub(crate) fn get(&self, index: usize) -> Option<&SnowflakeBinding> {
        self.bindings.get(index)
    }

    /// The `bindings` object of a query request, keyed by 1-based position.
    pub(crate) fn to_wire(&self) -> Option<IndexMap<String, SnowflakeBinding>> {
        if self.bindings.is_empty() {
            return None;
        }

        Some(
            self.bindings
                .iter()
                .enumerate()
                .map(|(i, binding)| ((i + 1).to_string(), binding.clone()))
                .collect(),
        )
    }
}

impl SnowflakeBinding {
    pub fn binding_type(&self) -> &str {
        self.binding_type
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

impl<'q> Arguments<'q> for SnowflakeArguments {
    type Database = Snowflake;

    fn reserve(&mut self, additional: usize, _size: usize) {
        self.bindings.reserve(additional);
    }

    fn add<T>(&mut self, value: T) -> Result<(), BoxDynError>
    where
        T: 'q + Encode<'q, Self::Database> + Type<Self::Database>,
    {
        let ty = value.produces().unwrap_or_else(T::type_info);
        let mut buf = SnowflakeArgumentBuffer::new();

        let value = match value.encode(&mut buf)? {
            IsNull::No => Some(buf.buffer),
            IsNull::Yes => None,
        };

        self.bindings.push(SnowflakeBinding {
            binding_type: ty.binding_type(),
            value,
        });

        Ok(())
    }

    fn len(&self) -> usize {
        self.bindings.len()
    }
}

impl SnowflakeArgumentBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_str(&mut self, s: &str) {
        self.buffer.push_str(s);
    }
}
