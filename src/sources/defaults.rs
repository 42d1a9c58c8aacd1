use super::{SourceKind, SourceLookup, SourceProvider};
use crate::error::SourceError;
use crate::paths::PathNamer;
use crate::settings::{FieldSpec, RawValue};

/// Declared defaults, always consulted last.
///
/// Values produced here skip coercion and constraint checks: static defaults
/// and factories were validated when the tree was built.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultsSource;

impl SourceProvider for DefaultsSource {
    fn name(&self) -> String {
        "defaults".to_string()
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Defaults
    }

    fn open(&self, _namer: &PathNamer) -> Result<Box<dyn SourceLookup>, SourceError> {
        Ok(Box::new(DefaultsLookup))
    }
}

struct DefaultsLookup;

impl SourceLookup for DefaultsLookup {
    fn lookup(&self, _key: &str, field: &FieldSpec) -> Option<RawValue> {
        field.default_for_resolution().map(RawValue::Typed)
    }

    fn len(&self) -> usize {
        0
    }
}
