use crate::graph::Graph;
use crate::node_id::NodeId;
use crate::selection::SelectionController;
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Search pattern could not be compiled: {0}")]
    Pattern(#[from] regex::Error),
}

/// Outcome of a block search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    /// Every matching block, in graph order; all of them get highlighted.
    pub matches: Vec<NodeId>,
    /// How many of `matches` the result list shows.
    pub shown: usize,
}

impl SearchResults {
    /// The entries displayed in the result list.
    pub fn listed(&self) -> &[NodeId] {
        &self.matches[..self.shown]
    }

    /// Blocks to highlight: all matches plus the current selection.
    pub fn highlighted(&self, selection: &SelectionController) -> HashSet<NodeId> {
        let mut set: HashSet<NodeId> = self.matches.iter().cloned().collect();
        if let Some(selected) = selection.selected() {
            set.insert(selected.clone());
        }
        set
    }
}

/// Turns free search text into a matcher: the text is taken literally, except that
/// commas separate alternatives. Matching ignores case.
pub fn compile_query(text: &str) -> Result<Option<Regex>, SearchError> {
    let alternatives: Vec<String> = text
        .split(',')
        .filter(|part| !part.is_empty())
        .map(regex::escape)
        .collect();
    if alternatives.is_empty() {
        return Ok(None);
    }
    let regex = RegexBuilder::new(&alternatives.join("|"))
        .case_insensitive(true)
        .build()?;
    Ok(Some(regex))
}

/// Finds blocks whose display id matches `text`, listing at most `limit` of them.
///
/// Empty text matches nothing.
pub fn search(graph: &Graph, text: &str, limit: usize) -> Result<SearchResults, SearchError> {
    let Some(matcher) = compile_query(text)? else {
        return Ok(SearchResults::default());
    };
    let matches: Vec<NodeId> = graph
        .nodes()
        .iter()
        .filter(|n| matcher.is_match(n.display_id.to_display_form()))
        .map(|n| n.display_id.clone())
        .collect();
    let shown = matches.len().min(limit);
    Ok(SearchResults { matches, shown })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::payload::{RawTopology, ReplayData, StaticMetadata};

    fn graph_of(ids: &[&str]) -> Graph {
        let topology = RawTopology {
            nodes: ids.iter().map(|s| NodeId::new(*s)).collect(),
            edges: Vec::new(),
        };
        GraphBuilder::new(&topology, &ReplayData::default(), &StaticMetadata::new()).build()
    }

    #[test]
    fn matches_substrings_case_insensitively() {
        let graph = graph_of(&["Parser.c:1", "lexer.c:2", "parser.c:3"]);
        let results = search(&graph, "PARSER", 10).unwrap();
        assert_eq!(
            results.matches,
            vec![NodeId::new("Parser.c:1"), NodeId::new("parser.c:3")]
        );
        assert_eq!(results.shown, 2);
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let graph = graph_of(&["a.c:1", "abc:1", "x(y).c:4"]);
        let results = search(&graph, "a.c", 10).unwrap();
        assert_eq!(
            results.matches,
            vec![NodeId::new("a.c:1")],
            "The dot must not act as a wildcard"
        );
        assert_eq!(search(&graph, "(y)", 10).unwrap().matches.len(), 1);
    }

    #[test]
    fn commas_separate_alternatives() {
        let graph = graph_of(&["lexer.c:2", "parser.c:3", "main.c:9"]);
        let results = search(&graph, "lexer,main", 10).unwrap();
        assert_eq!(
            results.matches,
            vec![NodeId::new("lexer.c:2"), NodeId::new("main.c:9")]
        );
    }

    #[test]
    fn result_list_is_capped_but_highlight_is_not() {
        let ids: Vec<String> = (1..=14).map(|i| format!("blk.c:{i}")).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let graph = graph_of(&refs);

        let results = search(&graph, "blk", 10).unwrap();
        assert_eq!(results.matches.len(), 14);
        assert_eq!(results.listed().len(), 10);
        assert_eq!(results.listed()[0], NodeId::new("blk.c:1"));

        let mut selection = SelectionController::new();
        assert_eq!(results.highlighted(&selection).len(), 14);
        let other = graph_of(&["solo.c:1"]);
        selection.select(&other, "solo.c:1").unwrap();
        assert!(
            results
                .highlighted(&selection)
                .contains(&NodeId::new("solo.c:1")),
            "The current selection stays highlighted"
        );
    }

    #[test]
    fn empty_text_matches_nothing() {
        let graph = graph_of(&["a:1"]);
        assert_eq!(search(&graph, "", 10).unwrap(), SearchResults::default());
        assert_eq!(search(&graph, ",", 10).unwrap(), SearchResults::default());
    }
}
