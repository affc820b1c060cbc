//! Private offset filters.
//!
//! Private-input offsets are maintained by the engine and may not be
//! supplied by callers; private-output offsets are stored but never shown.

use onto_dict::{resolve, Dictionary, DictError};
use onto_types::Document;

use crate::error::{EngineError, EngineResult};

/// Fail if `doc` carries an offset callers may not set.
///
/// Unknown tags are left for the traversal to report.
pub fn reject_private_input(dict: &dyn Dictionary, doc: &Document) -> EngineResult<()> {
    for tag in doc.keys() {
        match resolve(dict, tag) {
            Ok(descriptor) if descriptor.is_private_input() => {
                return Err(EngineError::PrivateOffset { tag: tag.clone() });
            }
            Ok(_) | Err(DictError::UnresolvedTag { .. }) => {}
            Err(other) => return Err(other.into()),
        }
    }
    Ok(())
}

/// Copy of `doc` without private-output offsets. Unknown tags are kept.
pub fn strip_private_output(dict: &dyn Dictionary, doc: &Document) -> EngineResult<Document> {
    let mut visible = Document::new();
    for (tag, value) in doc {
        let hidden = match resolve(dict, tag) {
            Ok(descriptor) => descriptor.is_private_output(),
            Err(DictError::UnresolvedTag { .. }) => false,
            Err(other) => return Err(other.into()),
        };
        if !hidden {
            visible.insert(tag.clone(), value.clone());
        }
    }
    Ok(visible)
}
