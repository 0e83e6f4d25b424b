//! Flattening of nested tables of contents into section records

use crate::graphql::{TocEntry, WikiPage};
use serde::{Deserialize, Serialize};

/// One section of a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocRecord {
    pub title: String,
    /// Parent title and own title, space separated
    pub title_combined: String,
    pub content: String,
    /// Title of the page the section belongs to
    pub page: String,
    pub path: String,
}

/// Depth-first walk over every page's table of contents
pub fn flatten_pages(pages: &[WikiPage]) -> Vec<TocRecord> {
    let mut records = Vec::new();
    for page in pages {
        for entry in &page.toc {
            flatten_entry(entry, page, &page.title, &mut records);
        }
    }
    records
}

fn flatten_entry(entry: &TocEntry, page: &WikiPage, parent_title: &str, out: &mut Vec<TocRecord>) {
    out.push(TocRecord {
        title: entry.title.clone(),
        title_combined: format!("{} {}", parent_title, entry.title),
        content: entry.summary.clone(),
        page: page.title.clone(),
        path: format!("{}{}", page.path, entry.anchor),
    });
    for child in &entry.children {
        flatten_entry(child, page, &entry.title, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, anchor: &str, children: Vec<TocEntry>) -> TocEntry {
        TocEntry {
            title: title.to_string(),
            summary: format!("about {}", title.to_lowercase()),
            anchor: anchor.to_string(),
            children,
        }
    }

    #[test]
    fn test_flatten_nested_toc() {
        let page = WikiPage {
            id: Some(1),
            title: "Handbook".to_string(),
            path: "en/handbook".to_string(),
            toc: vec![
                entry(
                    "Leave",
                    "#leave",
                    vec![entry(
                        "Annual",
                        "#annual",
                        vec![entry("Carry Over", "#carry-over", vec![])],
                    )],
                ),
                entry("Payroll", "#payroll", vec![]),
            ],
        };

        let records = flatten_pages(&[page]);
        let combined: Vec<&str> = records.iter().map(|r| r.title_combined.as_str()).collect();

        // depth first, each title prefixed by its direct parent only
        assert_eq!(
            combined,
            vec![
                "Handbook Leave",
                "Leave Annual",
                "Annual Carry Over",
                "Handbook Payroll"
            ]
        );
        assert_eq!(records[2].path, "en/handbook#carry-over");
        assert_eq!(records[2].page, "Handbook");
        assert_eq!(records[2].content, "about carry over");
    }

    #[test]
    fn test_pages_without_toc_yield_nothing() {
        let page = WikiPage {
            id: None,
            title: "Empty".to_string(),
            path: "en/empty".to_string(),
            toc: Vec::new(),
        };
        assert!(flatten_pages(&[page]).is_empty());
    }
}
