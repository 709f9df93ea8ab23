use crate::matching::normalize::{Normalized, collapse_whitespace, normalize};
use crate::matching::{Match, MatcherConfig};
use crate::projection::{Projection, project};
use crate::tree::Node;

/// Searchable view of one document state.
///
/// `normalized` maps into projection characters; `search` (the collapsed
/// layer) maps into `normalized`. With collapsing disabled the two layers
/// are identical.
#[derive(Debug, Clone, Default)]
pub struct NormalizedIndex {
    pub projection: Projection,
    pub normalized: Normalized,
    pub search: Normalized,
}

impl NormalizedIndex {
    pub fn build(nodes: &[Node], config: &MatcherConfig) -> Self {
        let projection = project(nodes, &config.projection);
        let normalized = normalize(&projection.text, &config.normalize);
        let search = if config.normalize.collapse_whitespace {
            collapse_whitespace(&normalized.chars)
        } else {
            Normalized::identity(&normalized.chars)
        };
        Self {
            projection,
            normalized,
            search,
        }
    }

    pub fn normalized_text(&self) -> String {
        self.normalized.text()
    }

    pub fn search_chars(&self) -> &[char] {
        &self.search.chars
    }

    /// Position of the projected character a normalized character came from.
    pub fn norm_to_position(&self, norm_index: usize) -> Option<usize> {
        let span = self.normalized.spans.get(norm_index)?;
        self.projection.offset_to_pos(span.start)
    }

    /// Maps a hit in the search layer back to a [`Match`].
    pub fn resolve(&self, start: usize, end: usize) -> Option<Match> {
        let norm = self.search.source_range(start, end)?;
        let text = self.normalized.source_range(norm.start, norm.end)?;
        let from = self.projection.offset_to_pos(text.start)?;
        let to = self.projection.offset_to_pos_end(text.end)?;
        Some(Match {
            norm_start: norm.start,
            norm_end: norm.end,
            from,
            to,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::NormalizeOptions;
    use crate::tree::{ContainerKind, Document};
    use pretty_assertions::assert_eq;

    #[test]
    fn search_layer_maps_back_through_both_layers() {
        let doc = Document::new(vec![Node::container(
            ContainerKind::Paragraph,
            vec![Node::text("a\u{00A0}\u{00A0}b")],
        )]);
        let index = NormalizedIndex::build(&doc.content, &MatcherConfig::default());
        assert_eq!(index.search_chars(), &['a', ' ', 'b']);
        assert_eq!(
            index.resolve(0, 3),
            Some(Match {
                norm_start: 0,
                norm_end: 4,
                from: 1,
                to: 5
            })
        );
    }

    #[test]
    fn identity_search_layer_when_collapsing_is_off() {
        let config = MatcherConfig {
            normalize: NormalizeOptions {
                collapse_whitespace: false,
                ..NormalizeOptions::default()
            },
            ..MatcherConfig::default()
        };
        let doc = Document::from_paragraphs(&["a  b"]);
        let index = NormalizedIndex::build(&doc.content, &config);
        assert_eq!(index.search_chars().len(), 4);
        assert_eq!(index.norm_to_position(3), Some(4));
    }
}
