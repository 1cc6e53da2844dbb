//! The type model: GDScript types as the analyzer sees them, plus the
//! confidence grading attached to every inference result.

use std::fmt::Display;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// A GDScript type. `Variant` is the top type: every value matches it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Variant,
    Void,
    Null,
    /// Any named engine or project type, including `int`, `float`, `bool`,
    /// `String`, vectors and user classes.
    Named(String),
    /// `Array` or `Array[T]`.
    Array(Option<Box<Type>>),
    /// `Dictionary` or `Dictionary[K, V]`.
    Dictionary(Option<Box<(Type, Type)>>),
}

static NUMERIC_TYPES: &[&str] = &["int", "float"];

static STRING_TYPES: &[&str] = &["String", "StringName", "NodePath"];

static VECTOR_TYPES: &[&str] = &[
    "Vector2", "Vector2i", "Vector3", "Vector3i", "Vector4", "Vector4i",
];

static COLOR_TYPES: &[&str] = &["Color"];

/// Packed arrays and their fixed element types.
pub static PACKED_ARRAY_ELEMENTS: Lazy<Vec<(&'static str, Type)>> = Lazy::new(|| {
    vec![
        ("PackedByteArray", Type::Named("int".into())),
        ("PackedInt32Array", Type::Named("int".into())),
        ("PackedInt64Array", Type::Named("int".into())),
        ("PackedFloat32Array", Type::Named("float".into())),
        ("PackedFloat64Array", Type::Named("float".into())),
        ("PackedStringArray", Type::Named("String".into())),
        ("PackedVector2Array", Type::Named("Vector2".into())),
        ("PackedVector3Array", Type::Named("Vector3".into())),
        ("PackedColorArray", Type::Named("Color".into())),
    ]
});

impl Type {
    pub fn named(name: impl Into<String>) -> Type {
        let name = name.into();
        match name.as_str() {
            "Variant" => Type::Variant,
            "void" => Type::Void,
            "Array" => Type::Array(None),
            "Dictionary" => Type::Dictionary(None),
            _ => Type::Named(name),
        }
    }

    pub fn int() -> Type {
        Type::Named("int".into())
    }

    pub fn float() -> Type {
        Type::Named("float".into())
    }

    pub fn boolean() -> Type {
        Type::Named("bool".into())
    }

    pub fn string() -> Type {
        Type::Named("String".into())
    }

    /// The bare name this type resolves members against.
    pub fn name(&self) -> String {
        match self {
            Type::Variant => "Variant".into(),
            Type::Void => "void".into(),
            Type::Null => "null".into(),
            Type::Named(name) => name.clone(),
            Type::Array(_) => "Array".into(),
            Type::Dictionary(_) => "Dictionary".into(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Named(name) if NUMERIC_TYPES.contains(&name.as_str()))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Type::Named(name) if STRING_TYPES.contains(&name.as_str()))
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Type::Named(name) if VECTOR_TYPES.contains(&name.as_str()))
    }

    pub fn is_color(&self) -> bool {
        matches!(self, Type::Named(name) if COLOR_TYPES.contains(&name.as_str()))
    }

    pub fn is_array(&self) -> bool {
        match self {
            Type::Array(_) => true,
            Type::Named(name) => PACKED_ARRAY_ELEMENTS
                .iter()
                .any(|entry| entry.0 == name.as_str()),
            _ => false,
        }
    }

    pub fn is_dictionary(&self) -> bool {
        matches!(self, Type::Dictionary(_))
    }

    pub fn is_variant(&self) -> bool {
        matches!(self, Type::Variant)
    }

    /// Element type an indexer yields on this type, if it is fixed.
    pub fn element_type(&self) -> Option<Type> {
        match self {
            Type::Array(Some(element)) => Some((**element).clone()),
            Type::Array(None) => Some(Type::Variant),
            Type::Dictionary(Some(pair)) => Some(pair.1.clone()),
            Type::Dictionary(None) => Some(Type::Variant),
            Type::Named(name) => {
                if let Some(entry) = PACKED_ARRAY_ELEMENTS
                    .iter()
                    .find(|entry| entry.0 == name.as_str())
                {
                    return Some(entry.1.clone());
                }
                if VECTOR_TYPES.contains(&name.as_str()) {
                    let element = if name.ends_with('i') { "int" } else { "float" };
                    return Some(Type::Named(element.into()));
                }
                if name == "String" {
                    return Some(Type::string());
                }
                None
            }
            _ => None,
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Variant => f.write_str("Variant"),
            Type::Void => f.write_str("void"),
            Type::Null => f.write_str("null"),
            Type::Named(name) => f.write_str(name),
            Type::Array(None) => f.write_str("Array"),
            Type::Array(Some(element)) => write!(f, "Array[{element}]"),
            Type::Dictionary(None) => f.write_str("Dictionary"),
            Type::Dictionary(Some(pair)) => write!(f, "Dictionary[{}, {}]", pair.0, pair.1),
        }
    }
}

/// How sure the inference engine is about a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Confidence {
    Unknown,
    Low,
    Medium,
    High,
    Certain,
}

/// Why an inference produced the result it did; mostly interesting for the
/// degraded cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InferenceReason {
    Declared,
    Literal,
    Resolved,
    ProviderLookup,
    OperatorTable,
    SceneLookup,
    Fallback,
    Cycle,
    DepthExceeded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferredType {
    pub ty: Type,
    pub confidence: Confidence,
    pub reason: InferenceReason,
}

impl InferredType {
    pub fn new(ty: Type, confidence: Confidence, reason: InferenceReason) -> InferredType {
        InferredType {
            ty,
            confidence,
            reason,
        }
    }

    pub fn certain(ty: Type, reason: InferenceReason) -> InferredType {
        InferredType::new(ty, Confidence::Certain, reason)
    }

    pub fn unknown(reason: InferenceReason) -> InferredType {
        InferredType::new(Type::Variant, Confidence::Unknown, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates() {
        assert!(Type::int().is_numeric());
        assert!(Type::float().is_numeric());
        assert!(!Type::string().is_numeric());
        assert!(Type::string().is_string());
        assert!(Type::named("Vector2").is_vector());
        assert!(Type::named("Color").is_color());
        assert!(Type::Array(None).is_array());
        assert!(Type::named("PackedByteArray").is_array());
        assert!(Type::Dictionary(None).is_dictionary());
    }

    #[test]
    fn test_element_types() {
        assert_eq!(
            Type::named("PackedByteArray").element_type(),
            Some(Type::int())
        );
        assert_eq!(
            Type::named("Vector2").element_type(),
            Some(Type::float())
        );
        assert_eq!(
            Type::named("Vector2i").element_type(),
            Some(Type::int())
        );
        assert_eq!(
            Type::Array(Some(Box::new(Type::int()))).element_type(),
            Some(Type::int())
        );
        assert_eq!(
            Type::Dictionary(Some(Box::new((Type::string(), Type::float())))).element_type(),
            Some(Type::float())
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Type::Array(Some(Box::new(Type::int()))).to_string(),
            "Array[int]"
        );
        assert_eq!(
            Type::Dictionary(Some(Box::new((Type::string(), Type::int())))).to_string(),
            "Dictionary[String, int]"
        );
    }

    #[test]
    fn test_named_normalizes_special_names() {
        assert_eq!(Type::named("Variant"), Type::Variant);
        assert_eq!(Type::named("Array"), Type::Array(None));
        assert_eq!(Type::named("MyClass"), Type::Named("MyClass".into()));
    }
}
