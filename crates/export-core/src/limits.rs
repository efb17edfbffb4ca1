//! Tunable limits consumed by the value serializer (§4.1-AMBIENT).
//!
//! Every bound C1 enforces lives here, sourced from `ExportConfig` at the
//! binary crate rather than hard-coded — Open Question (3) calls out that
//! the upstream project's own path-mode thresholds vary between test and
//! production defaults, so this type is what lets a caller vary them too.

/// Depth/size/collection bounds for one export run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SerializerLimits {
    /// depth < this: full (Deep) serialization.
    pub nested_shallow_depth: usize,
    /// this <= depth < max_nested_depth: Reference mode (id + labels/type only).
    pub nested_reference_depth: usize,
    /// depth >= this: abort the subtree, emit null, record DepthExceeded.
    pub max_nested_depth: usize,
    /// Lists longer than this are truncated with `truncated`/`original_length`.
    pub max_collection_items: usize,
    /// Label-set cap in Deep mode.
    pub max_labels_per_node: usize,
    /// Label-set cap in Reference mode.
    pub max_labels_in_reference_mode: usize,
    /// Label-set cap for nodes in Compact path mode.
    pub max_labels_in_path_compact: usize,
    /// Paths longer (by node count) than this are refused outright.
    pub max_path_length: usize,
    /// Node count at or below which a path serializes in Full mode.
    pub path_full_limit: usize,
    /// Node count at or below which a path serializes in Compact mode
    /// (beyond `path_full_limit`); above this, IdsOnly.
    pub path_compact_limit: usize,
    /// Depth cap applied to property maps of nodes/relationships inside a
    /// Full-mode path, independent of the ambient depth bands above.
    pub path_property_depth: usize,
}

impl Default for SerializerLimits {
    fn default() -> Self {
        Self {
            nested_shallow_depth: 3,
            nested_reference_depth: 6,
            max_nested_depth: 10,
            max_collection_items: 1000,
            max_labels_per_node: 100,
            max_labels_in_reference_mode: 3,
            max_labels_in_path_compact: 3,
            max_path_length: 1000,
            path_full_limit: 10,
            path_compact_limit: 50,
            path_property_depth: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bands_are_ordered() {
        let limits = SerializerLimits::default();
        assert!(limits.nested_shallow_depth < limits.nested_reference_depth);
        assert!(limits.nested_reference_depth < limits.max_nested_depth);
        assert!(limits.path_full_limit < limits.path_compact_limit);
        assert!(limits.path_compact_limit < limits.max_path_length);
    }
}
