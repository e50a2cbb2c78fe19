use crate::decode::Decode;
use crate::encode::{Encode, IsNull};
use crate::error::BoxDynError;
use crate::snowflake::{
    Snowflake, SnowflakeArgumentBuffer, SnowflakeType, SnowflakeTypeInfo, SnowflakeValueRef,
};
use crate::types::Type;

impl Type<Snowflake> for str {
    fn type_info() -> SnowflakeTypeInfo {
        SnowflakeTypeInfo::new(SnowflakeType::Text)
    }

    fn compatible(ty: &SnowflakeTypeInfo) -> bool {
        // semi-structured and spatial values can be read as their JSON text
        matches!(
            ty.r#type(),
            SnowflakeType::Text | SnowflakeType::Geography | SnowflakeType::Geometry
        ) || ty.r#type().is_semi_structured()
    }
}

impl<'q> Encode<'q, Snowflake> for &'q str {
    fn encode_by_ref(&self, buf: &mut SnowflakeArgumentBuffer) -> Result<IsNull, BoxDynError> {
        buf.push_str(self);

        Ok(IsNull::No)
    }
}

impl<'r> Decode<'r, Snowflake> for &'r str {
    fn decode(value: SnowflakeValueRef<'r>) -> Result<Self, BoxDynError> {
        value.as_str()
    }
}

impl Type<Snowflake> for String {
    fn type_info() -> SnowflakeTypeInfo {
        <str as Type<Snowflake>>::type_info()
    }

    fn compatible(ty: &SnowflakeTypeInfo) -> bool {
        <str as Type<Snowflake>>::compatible(ty)
    }
}

impl Encode<'_, Snowflake> for String {
    fn encode(self, buf: &mut SnowflakeArgumentBuffer) -> Result<IsNull, BoxDynError> {
        if buf.buffer.is_empty() {
            buf.buffer = self;
        } else {
            buf.push_str(&self);
        }

        Ok(IsNull::No)
    }

    fn encode_by_ref(&self, buf: &mut SnowflakeArgumentBuffer) -> Result<IsNull, BoxDynError> {
        <&str as Encode<Snowflake>>::encode(&**self, buf)
    }
}

impl Decode<'_, Snowflake> for String {
    fn decode(value: SnowflakeValueRef<'_>) -> Result<Self, BoxDynError> {
        value.as_str().map(ToOwned::to_owned)
    }
}
