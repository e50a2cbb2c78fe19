use crate::decode::Decode;
use crate::encode::{Encode, IsNull};
use crate::error::BoxDynError;
use crate::snowflake::codec;
use crate::snowflake::{
    Snowflake, SnowflakeArgumentBuffer, SnowflakeType, SnowflakeTypeInfo, SnowflakeValueRef,
};
use crate::types::Type;

impl Type<Snowflake> for bool {
    fn type_info() -> SnowflakeTypeInfo {
        SnowflakeTypeInfo::new(SnowflakeType::Boolean)
    }

    fn compatible(ty: &SnowflakeTypeInfo) -> bool {
        matches!(ty.r#type(), SnowflakeType::Boolean)
    }
}

impl Encode<'_, Snowflake> for bool {
    fn encode_by_ref(&self, buf: &mut SnowflakeArgumentBuffer) -> Result<IsNull, BoxDynError> {
        buf.push_str(if *self { "true" } else { "false" });

        Ok(IsNull::No)
    }
}

impl Decode<'_, Snowflake> for bool {
    fn decode(value: SnowflakeValueRef<'_>) -> Result<bool, BoxDynError> {
        codec::decode_bool(value.as_str()?)
    }
}
