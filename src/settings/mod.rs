//! Settings tree declarations and resolved snapshots.
//!
//! A tree is declared once with [`SettingsNode::builder`] and is immutable
//! afterwards:
//!
//! ```
//! use settings_tree::settings::{FieldSpec, FieldType, SettingsNode};
//!
//! let server = SettingsNode::builder("server")
//!     .field("port", FieldSpec::integer().default_value(8080))
//!     .build()
//!     .unwrap();
//!
//! let runner = SettingsNode::builder("runner")
//!     .field("poll_frequency", FieldSpec::integer().default_value(10))
//!     .field(
//!         "heartbeat_frequency",
//!         FieldSpec::optional(FieldType::Integer).minimum(30),
//!     )
//!     .node(server)
//!     .build()
//!     .unwrap();
//! assert!(runner.node("server").is_some());
//! ```

mod field;
mod node;
mod resolved;
mod value;

pub use field::{Constraint, DefaultFactory, DefaultValue, FieldSpec};
pub use node::{SettingsEntry, SettingsNode, SettingsNodeBuilder};
pub use resolved::{Provenance, ResolvedEntry, ResolvedSettings, ResolvedValue, SettingChange};
pub use value::{FieldType, RawValue, Value, parse_bool};
