//! Search and suggest requests and their results.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::Distance;

/// Which backends a search manager consults.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchManagerType {
    /// Online when possible, offline otherwise.
    #[default]
    Combined,
    Online,
    Offline,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchType {
    /// Toponyms: addresses, streets, cities.
    Geo,
    /// Businesses.
    Biz,
}

/// Options for a search or suggest request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchOptions {
    /// The kinds of objects to look for. Empty means all kinds.
    pub search_types: Vec<SearchType>,
    /// The maximum number of items in a response.
    pub result_page_size: Option<u32>,
}

/// One object found by a search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchItem {
    pub name: CompactString,
    pub description: CompactString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<CompactString>,
}

/// A successful response to a search.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub items: Vec<SearchItem>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SuggestType {
    Unknown,
    Toponym,
    Business,
    Transit,
}

/// What the host should do when the user picks a suggestion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SuggestAction {
    /// Run a search with `search_text`.
    Search,
    /// Replace the query with `display_text` and keep typing.
    Substitute,
}

/// One suggestion for a partial query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestItem {
    #[serde(rename = "type")]
    pub kind: SuggestType,
    pub title: CompactString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<CompactString>,
    pub search_text: CompactString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_text: Option<CompactString>,
    pub is_personal: bool,
    pub is_word_item: bool,
    pub action: SuggestAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<Distance>,
    #[serde(default)]
    pub tags: Vec<CompactString>,
}
