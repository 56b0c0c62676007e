use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::{ArborError, ArborResult, FieldValue, Realm, RefId, Timestamp};

/// An encoder/decoder pair between one domain value type and its row-shaped
/// representation. Codecs are pure; they never touch the backend.
pub trait Codec: Send + Sync {
    fn encode(&self, value: &dyn Any) -> ArborResult<FieldValue>;
    fn decode(&self, value: &FieldValue) -> ArborResult<Box<dyn Any>>;
}

/// Process-wide codec lookup keyed by `(type, realm)`. Populated during
/// process init and treated as immutable afterwards; the store shares it
/// behind an `Arc`.
#[derive(Default)]
pub struct CodecRegistry {
    codecs: HashMap<(TypeId, Realm), Arc<dyn Codec>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-loaded with the primitive codecs for the database
    /// realm: `bool`, `i64`, `f64`, `String`, `RefId`, `Timestamp`,
    /// `NaiveDate`, and raw JSON values.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_primitive::<bool>(Realm::Database);
        registry.register_primitive::<i64>(Realm::Database);
        registry.register_primitive::<f64>(Realm::Database);
        registry.register_primitive::<String>(Realm::Database);
        registry.register_primitive::<RefId>(Realm::Database);
        registry.register_primitive::<Timestamp>(Realm::Database);
        registry.register_primitive::<NaiveDate>(Realm::Database);
        registry.register_primitive::<JsonValue>(Realm::Database);
        registry
    }

    pub fn register<T: 'static>(&mut self, realm: Realm, codec: Arc<dyn Codec>) {
        self.codecs.insert((TypeId::of::<T>(), realm), codec);
    }

    pub fn register_primitive<T: Primitive>(&mut self, realm: Realm) {
        self.register::<T>(realm, Arc::new(PrimitiveCodec::<T>::new()));
    }

    pub fn register_enum<T: EnumValue>(&mut self, realm: Realm) {
        self.register::<T>(realm, Arc::new(EnumCodec::<T>::new()));
    }

    pub fn register_composite<T: CompositeValue>(&mut self, realm: Realm) {
        self.register::<T>(realm, Arc::new(CompositeCodec::<T>::new()));
    }

    pub fn register_atomic<T: AtomicValue>(&mut self, realm: Realm) {
        self.register::<T>(realm, Arc::new(AtomicCodec::<T>::new()));
    }

    pub fn register_secret<T: SecretValue>(&mut self, realm: Realm) {
        self.register::<T>(realm, Arc::new(SecretCodec::<T>::new()));
    }

    pub fn get_encoder<T: 'static>(&self, realm: Realm) -> ArborResult<&Arc<dyn Codec>> {
        self.lookup::<T>(realm)
    }

    pub fn get_decoder<T: 'static>(&self, realm: Realm) -> ArborResult<&Arc<dyn Codec>> {
        self.lookup::<T>(realm)
    }

    fn lookup<T: 'static>(&self, realm: Realm) -> ArborResult<&Arc<dyn Codec>> {
        self.codecs
            .get(&(TypeId::of::<T>(), realm))
            .ok_or_else(|| {
                ArborError::invalid(format!(
                    "no codec registered for `{}` in realm {realm:?}",
                    type_name::<T>()
                ))
            })
    }

    pub fn encode<T: 'static>(&self, realm: Realm, value: &T) -> ArborResult<FieldValue> {
        self.get_encoder::<T>(realm)?.encode(value)
    }

    pub fn encode_opt<T: 'static>(
        &self,
        realm: Realm,
        value: Option<&T>,
    ) -> ArborResult<FieldValue> {
        match value {
            Some(value) => self.encode(realm, value),
            None => Ok(FieldValue::Null),
        }
    }

    pub fn decode<T: 'static>(&self, realm: Realm, value: &FieldValue) -> ArborResult<T> {
        let decoded = self.get_decoder::<T>(realm)?.decode(value)?;
        decoded.downcast::<T>().map(|value| *value).map_err(|_| {
            ArborError::invalid(format!(
                "codec for `{}` decoded an unexpected type",
                type_name::<T>()
            ))
        })
    }

    pub fn decode_opt<T: 'static>(
        &self,
        realm: Realm,
        value: &FieldValue,
    ) -> ArborResult<Option<T>> {
        if value.is_null() {
            return Ok(None);
        }
        self.decode(realm, value).map(Some)
    }
}

fn unexpected_input<T>() -> ArborError {
    ArborError::invalid(format!(
        "codec for `{}` received a value of a different type",
        type_name::<T>()
    ))
}

fn mismatched_value<T>(value: &FieldValue) -> ArborError {
    ArborError::invalid(format!(
        "cannot decode `{}` out of {value:?}",
        type_name::<T>()
    ))
}

/// Value types with a direct `FieldValue` representation.
pub trait Primitive: Sized + 'static {
    fn to_field_value(&self) -> FieldValue;
    fn from_field_value(value: &FieldValue) -> ArborResult<Self>;
}

impl Primitive for bool {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Bool(*self)
    }

    fn from_field_value(value: &FieldValue) -> ArborResult<Self> {
        value.as_bool().ok_or_else(|| mismatched_value::<Self>(value))
    }
}

impl Primitive for i64 {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::I64(*self)
    }

    fn from_field_value(value: &FieldValue) -> ArborResult<Self> {
        value.as_i64().ok_or_else(|| mismatched_value::<Self>(value))
    }
}

impl Primitive for f64 {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::F64(*self)
    }

    fn from_field_value(value: &FieldValue) -> ArborResult<Self> {
        value.as_f64().ok_or_else(|| mismatched_value::<Self>(value))
    }
}

impl Primitive for String {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Str(self.clone())
    }

    fn from_field_value(value: &FieldValue) -> ArborResult<Self> {
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| mismatched_value::<Self>(value))
    }
}

impl Primitive for RefId {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Ref(*self)
    }

    fn from_field_value(value: &FieldValue) -> ArborResult<Self> {
        value
            .as_ref_id()
            .ok_or_else(|| mismatched_value::<Self>(value))
    }
}

impl Primitive for Timestamp {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::DateTime(*self)
    }

    fn from_field_value(value: &FieldValue) -> ArborResult<Self> {
        value
            .as_datetime()
            .ok_or_else(|| mismatched_value::<Self>(value))
    }
}

impl Primitive for NaiveDate {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Date(*self)
    }

    fn from_field_value(value: &FieldValue) -> ArborResult<Self> {
        value.as_date().ok_or_else(|| mismatched_value::<Self>(value))
    }
}

impl Primitive for JsonValue {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Json(self.clone())
    }

    fn from_field_value(value: &FieldValue) -> ArborResult<Self> {
        value
            .as_json()
            .cloned()
            .ok_or_else(|| mismatched_value::<Self>(value))
    }
}

/// Domain enums stored as their string tag.
pub trait EnumValue: Sized + 'static {
    fn as_str(&self) -> &'static str;
    fn from_str(value: &str) -> Option<Self>;
}

/// Structural values stored as JSON.
pub trait CompositeValue: Serialize + DeserializeOwned + 'static {}

/// Newtype-like values stored as their underlying primitive, the declared
/// base type deciding the column kind.
pub trait AtomicValue: Sized + 'static {
    type Base: Primitive;

    fn to_base(&self) -> Self::Base;
    fn from_base(base: Self::Base) -> ArborResult<Self>;
}

/// Sensitive strings; stored verbatim, the domain owns redaction.
pub trait SecretValue: Sized + 'static {
    fn reveal(&self) -> &str;
    fn conceal(value: String) -> Self;
}

pub struct PrimitiveCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> PrimitiveCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for PrimitiveCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Primitive> Codec for PrimitiveCodec<T> {
    fn encode(&self, value: &dyn Any) -> ArborResult<FieldValue> {
        let value = value.downcast_ref::<T>().ok_or_else(unexpected_input::<T>)?;
        Ok(value.to_field_value())
    }

    fn decode(&self, value: &FieldValue) -> ArborResult<Box<dyn Any>> {
        Ok(Box::new(T::from_field_value(value)?))
    }
}

pub struct EnumCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> EnumCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for EnumCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: EnumValue> Codec for EnumCodec<T> {
    fn encode(&self, value: &dyn Any) -> ArborResult<FieldValue> {
        let value = value.downcast_ref::<T>().ok_or_else(unexpected_input::<T>)?;
        Ok(FieldValue::Str(value.as_str().to_owned()))
    }

    fn decode(&self, value: &FieldValue) -> ArborResult<Box<dyn Any>> {
        let tag = value.as_str().ok_or_else(|| mismatched_value::<T>(value))?;
        let decoded = T::from_str(tag).ok_or_else(|| {
            ArborError::invalid(format!(
                "`{tag}` is not a known value of `{}`",
                type_name::<T>()
            ))
        })?;
        Ok(Box::new(decoded))
    }
}

pub struct CompositeCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> CompositeCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for CompositeCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: CompositeValue> Codec for CompositeCodec<T> {
    fn encode(&self, value: &dyn Any) -> ArborResult<FieldValue> {
        let value = value.downcast_ref::<T>().ok_or_else(unexpected_input::<T>)?;
        let json = serde_json::to_value(value)
            .map_err(|err| ArborError::invalid(format!("encode composite: {err}")))?;
        Ok(FieldValue::Json(json))
    }

    fn decode(&self, value: &FieldValue) -> ArborResult<Box<dyn Any>> {
        let json = value.as_json().ok_or_else(|| mismatched_value::<T>(value))?;
        let decoded: T = serde_json::from_value(json.clone())
            .map_err(|err| ArborError::invalid(format!("decode composite: {err}")))?;
        Ok(Box::new(decoded))
    }
}

pub struct AtomicCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> AtomicCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for AtomicCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: AtomicValue> Codec for AtomicCodec<T> {
    fn encode(&self, value: &dyn Any) -> ArborResult<FieldValue> {
        let value = value.downcast_ref::<T>().ok_or_else(unexpected_input::<T>)?;
        Ok(value.to_base().to_field_value())
    }

    fn decode(&self, value: &FieldValue) -> ArborResult<Box<dyn Any>> {
        let base = T::Base::from_field_value(value)?;
        Ok(Box::new(T::from_base(base)?))
    }
}

pub struct SecretCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> SecretCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for SecretCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SecretValue> Codec for SecretCodec<T> {
    fn encode(&self, value: &dyn Any) -> ArborResult<FieldValue> {
        let value = value.downcast_ref::<T>().ok_or_else(unexpected_input::<T>)?;
        Ok(FieldValue::Str(value.reveal().to_owned()))
    }

    fn decode(&self, value: &FieldValue) -> ArborResult<Box<dyn Any>> {
        let raw = value.as_str().ok_or_else(|| mismatched_value::<T>(value))?;
        Ok(Box::new(T::conceal(raw.to_owned())))
    }
}
