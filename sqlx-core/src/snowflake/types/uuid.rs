use uuid::Uuid;

use crate::decode::Decode;
use crate::encode::{Encode, IsNull};
use crate::error::BoxDynError;
use crate::snowflake::{Snowflake, SnowflakeArgumentBuffer, SnowflakeTypeInfo, SnowflakeValueRef};
use crate::types::Type;

// Snowflake has no UUID type; they are stored as their hyphenated text form
impl Type<Snowflake> for Uuid {
    fn type_info() -> SnowflakeTypeInfo {
        <str as Type<Snowflake>>::type_info()
    }

    fn compatible(ty: &SnowflakeTypeInfo) -> bool {
        <str as Type<Snowflake>>::compatible(ty)
    }
}

impl Encode<'_, Snowflake> for Uuid {
    fn encode_by_ref(&self, buf: &mut SnowflakeArgumentBuffer) -> Result<IsNull, BoxDynError> {
        buf.push_str(self.hyphenated().encode_lower(&mut Uuid::encode_buffer()));

        Ok(IsNull::No)
    }
}

impl Decode<'_, Snowflake> for Uuid {
    fn decode(value: SnowflakeValueRef<'_>) -> Result<Self, BoxDynError> {
        Ok(value.as_str()?.trim().parse()?)
    }
}
