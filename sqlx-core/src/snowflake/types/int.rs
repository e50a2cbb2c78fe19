use crate::decode::Decode;
use crate::encode::{Encode, IsNull};
use crate::error::BoxDynError;
use crate::snowflake::{
    Snowflake, SnowflakeArgumentBuffer, SnowflakeType, SnowflakeTypeInfo, SnowflakeValueRef,
};
use crate::types::Type;

fn int_compatible(ty: &SnowflakeTypeInfo) -> bool {
    matches!(ty.r#type(), SnowflakeType::Fixed) && ty.scale().unwrap_or(0) == 0
}

fn decode_int<T>(value: SnowflakeValueRef<'_>) -> Result<T, BoxDynError>
where
    T: std::str::FromStr,
{
    let raw = value.as_str()?;

    raw.trim().parse().map_err(|_| {
        format!(
            "value {:?} does not fit in {}",
            raw,
            std::any::type_name::<T>()
        )
        .into()
    })
}

macro_rules! impl_int {
    ($($T:ty),*) => {$(
        impl Type<Snowflake> for $T {
            fn type_info() -> SnowflakeTypeInfo {
                SnowflakeTypeInfo::new(SnowflakeType::Fixed).with_precision_scale(38, 0)
            }

            fn compatible(ty: &SnowflakeTypeInfo) -> bool {
                int_compatible(ty)
            }
        }

        impl Encode<'_, Snowflake> for $T {
            fn encode_by_ref(
                &self,
                buf: &mut SnowflakeArgumentBuffer,
            ) -> Result<IsNull, BoxDynError> {
                buf.push_str(itoa::Buffer::new().format(*self));

                Ok(IsNull::No)
            }
        }

        impl Decode<'_, Snowflake> for $T {
            fn decode(value: SnowflakeValueRef<'_>) -> Result<Self, BoxDynError> {
                decode_int(value)
            }
        }
    )*};
}

impl_int!(i8, i16, i32, i64, u8, u16, u32, u64);
