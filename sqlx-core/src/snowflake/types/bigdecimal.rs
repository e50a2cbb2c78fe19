use std::str::FromStr;

use bigdecimal::BigDecimal;

use crate::decode::Decode;
use crate::encode::{Encode, IsNull};
use crate::error::BoxDynError;
use crate::snowflake::{
    Snowflake, SnowflakeArgumentBuffer, SnowflakeType, SnowflakeTypeInfo, SnowflakeValueRef,
};
use crate::types::Type;

impl Type<Snowflake> for BigDecimal {
    fn type_info() -> SnowflakeTypeInfo {
        SnowflakeTypeInfo::new(SnowflakeType::Fixed)
    }

    fn compatible(ty: &SnowflakeTypeInfo) -> bool {
        matches!(ty.r#type(), SnowflakeType::Fixed | SnowflakeType::Real)
    }
}

impl Encode<'_, Snowflake> for BigDecimal {
    // a decimal literal may exceed what a FIXED bind accepts; let the server cast the text
    fn produces(&self) -> Option<SnowflakeTypeInfo> {
        Some(SnowflakeTypeInfo::new(SnowflakeType::Text))
    }

    fn encode_by_ref(&self, buf: &mut SnowflakeArgumentBuffer) -> Result<IsNull, BoxDynError> {
        buf.push_str(&self.to_string());

        Ok(IsNull::No)
    }
}

impl Decode<'_, Snowflake> for BigDecimal {
    fn decode(value: SnowflakeValueRef<'_>) -> Result<Self, BoxDynError> {
        Ok(BigDecimal::from_str(value.as_str()?.trim())?)
    }
}
