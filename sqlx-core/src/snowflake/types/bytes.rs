use crate::decode::Decode;
use crate::encode::{Encode, IsNull};
use crate::error::BoxDynError;
use crate::snowflake::codec;
use crate::snowflake::{
    Snowflake, SnowflakeArgumentBuffer, SnowflakeType, SnowflakeTypeInfo, SnowflakeValueRef,
};
use crate::types::Type;

impl Type<Snowflake> for [u8] {
    fn type_info() -> SnowflakeTypeInfo {
        SnowflakeTypeInfo::new(SnowflakeType::Binary)
    }

    fn compatible(ty: &SnowflakeTypeInfo) -> bool {
        matches!(ty.r#type(), SnowflakeType::Binary)
    }
}

// BINARY values travel hex encoded in both directions
impl Encode<'_, Snowflake> for &'_ [u8] {
    fn encode_by_ref(&self, buf: &mut SnowflakeArgumentBuffer) -> Result<IsNull, BoxDynError> {
        buf.push_str(&hex::encode_upper(self));

        Ok(IsNull::No)
    }
}

impl Type<Snowflake> for Vec<u8> {
    fn type_info() -> SnowflakeTypeInfo {
        <[u8] as Type<Snowflake>>::type_info()
    }

    fn compatible(ty: &SnowflakeTypeInfo) -> bool {
        <[u8] as Type<Snowflake>>::compatible(ty)
    }
}

impl Encode<'_, Snowflake> for Vec<u8> {
    fn encode_by_ref(&self, buf: &mut SnowflakeArgumentBuffer) -> Result<IsNull, BoxDynError> {
        <&[u8] as Encode<Snowflake>>::encode(&**self, buf)
    }
}

impl Decode<'_, Snowflake> for Vec<u8> {
    fn decode(value: SnowflakeValueRef<'_>) -> Result<Self, BoxDynError> {
        codec::decode_binary(value.as_str()?)
    }
}
