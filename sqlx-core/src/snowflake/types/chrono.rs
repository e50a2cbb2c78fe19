use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::decode::Decode;
use crate::encode::{Encode, IsNull};
use crate::error::BoxDynError;
use crate::snowflake::codec;
use crate::snowflake::{
    Snowflake, SnowflakeArgumentBuffer, SnowflakeType, SnowflakeTypeInfo, SnowflakeValueRef,
};
use crate::types::Type;

impl Type<Snowflake> for NaiveDate {
    fn type_info() -> SnowflakeTypeInfo {
        SnowflakeTypeInfo::new(SnowflakeType::Date)
    }

    fn compatible(ty: &SnowflakeTypeInfo) -> bool {
        matches!(ty.r#type(), SnowflakeType::Date)
    }
}

impl Encode<'_, Snowflake> for NaiveDate {
    fn encode_by_ref(&self, buf: &mut SnowflakeArgumentBuffer) -> Result<IsNull, BoxDynError> {
        buf.push_str(&self.format(codec::DATE_FORMAT).to_string());

        Ok(IsNull::No)
    }
}

impl Decode<'_, Snowflake> for NaiveDate {
    fn decode(value: SnowflakeValueRef<'_>) -> Result<Self, BoxDynError> {
        codec::decode_date(value.as_str()?)
    }
}

impl Type<Snowflake> for NaiveTime {
    fn type_info() -> SnowflakeTypeInfo {
        SnowflakeTypeInfo::new(SnowflakeType::Time).with_scale(9)
    }

    fn compatible(ty: &SnowflakeTypeInfo) -> bool {
        matches!(ty.r#type(), SnowflakeType::Time)
    }
}

impl Encode<'_, Snowflake> for NaiveTime {
    fn encode_by_ref(&self, buf: &mut SnowflakeArgumentBuffer) -> Result<IsNull, BoxDynError> {
        buf.push_str(&self.format(codec::TIME_FORMAT).to_string());

        Ok(IsNull::No)
    }
}

impl Decode<'_, Snowflake> for NaiveTime {
    fn decode(value: SnowflakeValueRef<'_>) -> Result<Self, BoxDynError> {
        codec::decode_time(value.as_str()?, value.fraction_digits())
    }
}

impl Type<Snowflake> for NaiveDateTime {
    fn type_info() -> SnowflakeTypeInfo {
        SnowflakeTypeInfo::new(SnowflakeType::TimestampNtz).with_scale(9)
    }

    fn compatible(ty: &SnowflakeTypeInfo) -> bool {
        matches!(ty.r#type(), SnowflakeType::TimestampNtz)
    }
}

impl Encode<'_, Snowflake> for NaiveDateTime {
    fn encode_by_ref(&self, buf: &mut SnowflakeArgumentBuffer) -> Result<IsNull, BoxDynError> {
        buf.push_str(&self.format(codec::TIMESTAMP_FORMAT).to_string());

        Ok(IsNull::No)
    }
}

impl Decode<'_, Snowflake> for NaiveDateTime {
    fn decode(value: SnowflakeValueRef<'_>) -> Result<Self, BoxDynError> {
        codec::decode_timestamp_ntz(value.as_str()?, value.fraction_digits())
    }
}

fn instant_compatible(ty: &SnowflakeTypeInfo) -> bool {
    matches!(
        ty.r#type(),
        SnowflakeType::TimestampLtz | SnowflakeType::TimestampTz
    )
}

fn encode_instant<Tz: TimeZone>(value: &DateTime<Tz>, buf: &mut SnowflakeArgumentBuffer)
where
    Tz::Offset: std::fmt::Display,
{
    buf.push_str(&value.format(codec::TIMESTAMP_TZ_FORMAT).to_string());
}

fn decode_instant(value: SnowflakeValueRef<'_>) -> Result<DateTime<FixedOffset>, BoxDynError> {
    let raw = value.as_str()?;
    let digits = value.fraction_digits();

    match value.type_info.r#type() {
        SnowflakeType::TimestampLtz => {
            codec::decode_timestamp_ltz(raw, digits).map(DateTime::<FixedOffset>::from)
        }
        _ => codec::decode_timestamp_tz(raw, digits),
    }
}

impl Type<Snowflake> for DateTime<FixedOffset> {
    fn type_info() -> SnowflakeTypeInfo {
        SnowflakeTypeInfo::new(SnowflakeType::TimestampTz).with_scale(9)
    }

    fn compatible(ty: &SnowflakeTypeInfo) -> bool {
        instant_compatible(ty)
    }
}

impl Encode<'_, Snowflake> for DateTime<FixedOffset> {
    fn encode_by_ref(&self, buf: &mut SnowflakeArgumentBuffer) -> Result<IsNull, BoxDynError> {
        encode_instant(self, buf);

        Ok(IsNull::No)
    }
}

impl Decode<'_, Snowflake> for DateTime<FixedOffset> {
    fn decode(value: SnowflakeValueRef<'_>) -> Result<Self, BoxDynError> {
        decode_instant(value)
    }
}

impl Type<Snowflake> for DateTime<Utc> {
    fn type_info() -> SnowflakeTypeInfo {
        SnowflakeTypeInfo::new(SnowflakeType::TimestampLtz).with_scale(9)
    }

    fn compatible(ty: &SnowflakeTypeInfo) -> bool {
        instant_compatible(ty)
    }
}

impl Encode<'_, Snowflake> for DateTime<Utc> {
    fn encode_by_ref(&self, buf: &mut SnowflakeArgumentBuffer) -> Result<IsNull, BoxDynError> {
        encode_instant(self, buf);

        Ok(IsNull::No)
    }
}

impl Decode<'_, Snowflake> for DateTime<Utc> {
    fn decode(value: SnowflakeValueRef<'_>) -> Result<Self, BoxDynError> {
        decode_instant(value).map(|instant| instant.with_timezone(&Utc))
    }
}

impl Type<Snowflake> for DateTime<Local> {
    fn type_info() -> SnowflakeTypeInfo {
        SnowflakeTypeInfo::new(SnowflakeType::TimestampLtz).with_scale(9)
    }

    fn compatible(ty: &SnowflakeTypeInfo) -> bool {
        instant_compatible(ty)
    }
}

impl Encode<'_, Snowflake> for DateTime<Local> {
    fn encode_by_ref(&self, buf: &mut SnowflakeArgumentBuffer) -> Result<IsNull, BoxDynError> {
        encode_instant(self, buf);

        Ok(IsNull::No)
    }
}

impl Decode<'_, Snowflake> for DateTime<Local> {
    fn decode(value: SnowflakeValueRef<'_>) -> Result<Self, BoxDynError> {
        decode_instant(value).map(|instant| instant.with_timezone(&Local))
    }
}
