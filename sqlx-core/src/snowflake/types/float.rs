use crate::decode::Decode;
use crate::encode::{Encode, IsNull};
use crate::error::BoxDynError;
use crate::snowflake::{
    Snowflake, SnowflakeArgumentBuffer, SnowflakeType, SnowflakeTypeInfo, SnowflakeValueRef,
};
use crate::types::Type;

fn float_compatible(ty: &SnowflakeTypeInfo) -> bool {
    // NUMBER(p, s) reads as a float too, at the cost of exactness
    matches!(ty.r#type(), SnowflakeType::Real | SnowflakeType::Fixed)
}

fn encode_float(value: f64, buf: &mut SnowflakeArgumentBuffer) {
    // the server spells the special values this way
    if value.is_nan() {
        buf.push_str("NaN");
    } else if value.is_infinite() {
        buf.push_str(if value > 0.0 { "inf" } else { "-inf" });
    } else {
        buf.push_str(&value.to_string());
    }
}

impl Type<Snowflake> for f32 {
    fn type_info() -> SnowflakeTypeInfo {
        SnowflakeTypeInfo::new(SnowflakeType::Real)
    }

    fn compatible(ty: &SnowflakeTypeInfo) -> bool {
        float_compatible(ty)
    }
}

impl Encode<'_, Snowflake> for f32 {
    fn encode_by_ref(&self, buf: &mut SnowflakeArgumentBuffer) -> Result<IsNull, BoxDynError> {
        if self.is_finite() {
            buf.push_str(&self.to_string());
        } else {
            encode_float(f64::from(*self), buf);
        }

        Ok(IsNull::No)
    }
}

impl Decode<'_, Snowflake> for f32 {
    fn decode(value: SnowflakeValueRef<'_>) -> Result<Self, BoxDynError> {
        Ok(value.as_str()?.trim().parse()?)
    }
}

impl Type<Snowflake> for f64 {
    fn type_info() -> SnowflakeTypeInfo {
        SnowflakeTypeInfo::new(SnowflakeType::Real)
    }

    fn compatible(ty: &SnowflakeTypeInfo) -> bool {
        float_compatible(ty)
    }
}

impl Encode<'_, Snowflake> for f64 {
    fn encode_by_ref(&self, buf: &mut SnowflakeArgumentBuffer) -> Result<IsNull, BoxDynError> {
        encode_float(*self, buf);

        Ok(IsNull::No)
    }
}

impl Decode<'_, Snowflake> for f64 {
    fn decode(value: SnowflakeValueRef<'_>) -> Result<Self, BoxDynError> {
        Ok(value.as_str()?.trim().parse()?)
    }
}
