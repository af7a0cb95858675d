use std::fmt;
use std::str::FromStr;

use crate::models::{ColumnId, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Dao,
    Engineering,
    Growth,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::Dao => "DAO",
            Category::Engineering => "Engineering",
            Category::Growth => "Growth",
        })
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dao" => Ok(Category::Dao),
            "engineering" => Ok(Category::Engineering),
            "growth" => Ok(Category::Growth),
            other => Err(format!("Unknown template category: {}", other)),
        }
    }
}

#[derive(Debug)]
pub struct TemplateTask {
    pub content: &'static str,
    pub column_id: ColumnId,
    pub tags: &'static [&'static str],
}

#[derive(Debug)]
pub struct Template {
    pub category: Category,
    pub title: &'static str,
    pub description: &'static str,
    pub tasks: &'static [TemplateTask],
}

const fn task(content: &'static str, column_id: ColumnId, tags: &'static [&'static str]) -> TemplateTask {
    TemplateTask {
        content,
        column_id,
        tags,
    }
}

pub static TEMPLATES: [Template; 6] = [
    Template {
        category: Category::Dao,
        title: "Proposal (SIP) Structure",
        description: "Standard template for submitting governance proposals.",
        tasks: &[
            task("Draft Proposal Title & Abstract", ColumnId::Backlog, &["Governance"]),
            task("Define Motivation & Rationale", ColumnId::Backlog, &["Governance"]),
            task("Specify Technical Implementation", ColumnId::Backlog, &["Dev"]),
            task("Community Feedback Period", ColumnId::Backlog, &["Community"]),
        ],
    },
    Template {
        category: Category::Dao,
        title: "Treasury Multisig Log",
        description: "Track incoming/outgoing transactions and signer status.",
        tasks: &[
            task("Verify Signer Addresses", ColumnId::Todo, &["Finance"]),
            task("Draft Transaction Payload", ColumnId::Todo, &["Finance"]),
            task("Collect Signatures (3/5)", ColumnId::Todo, &["Finance", "High Priority"]),
            task("Execute Transaction", ColumnId::Backlog, &["Finance"]),
        ],
    },
    Template {
        category: Category::Engineering,
        title: "Smart Contract Audit",
        description: "Pre-launch security checklist and audit report storage.",
        tasks: &[
            task("Run Slither Analysis", ColumnId::Todo, &["Security"]),
            task("Generate Test Coverage Report", ColumnId::Todo, &["Dev"]),
            task("Submit to Audit Firm", ColumnId::Backlog, &["External"]),
            task("Remediate Findings", ColumnId::Backlog, &["Dev", "High Priority"]),
        ],
    },
    Template {
        category: Category::Engineering,
        title: "Token Launch Roadmap",
        description: "Timeline view for Testnet, Audit, and TGE phases.",
        tasks: &[
            task("Deploy to Sepolia Testnet", ColumnId::Done, &["Dev"]),
            task("Finalize Tokenomics", ColumnId::InProgress, &["Product"]),
            task("Schedule TGE Date", ColumnId::Todo, &["Marketing"]),
            task("Setup Liquidity Pool", ColumnId::Backlog, &["DeFi"]),
        ],
    },
    Template {
        category: Category::Growth,
        title: "Airdrop Whitelist",
        description: "Table to manage wallet addresses and allocation amounts.",
        tasks: &[
            task("Define Eligibility Criteria", ColumnId::Done, &["Growth"]),
            task("Snapshot Block Height", ColumnId::Todo, &["Dev"]),
            task("Filter Sybil Attackers", ColumnId::Backlog, &["Security"]),
            task("Publish Merkle Root", ColumnId::Backlog, &["Dev"]),
        ],
    },
    Template {
        category: Category::Growth,
        title: "Content Calendar",
        description: "Schedule tweets, AMAs, and community calls.",
        tasks: &[
            task("Draft Weekly Thread", ColumnId::Todo, &["Content"]),
            task("Schedule Discord AMA", ColumnId::Todo, &["Community"]),
            task("Prepare Monthly Update", ColumnId::Backlog, &["Content"]),
        ],
    },
];

/// Templates in a category, or all of them
pub fn list(category: Option<Category>) -> impl Iterator<Item = &'static Template> {
    TEMPLATES
        .iter()
        .filter(move |t| category.is_none_or(|c| t.category == c))
}

/// Look a template up by title, ignoring case
pub fn find(title: &str) -> Option<&'static Template> {
    let title = title.trim();
    TEMPLATES.iter().find(|t| t.title.eq_ignore_ascii_case(title))
}

impl Template {
    /// Fresh board tasks for this template, due today
    pub fn instantiate(&self) -> Vec<Task> {
        let today = crate::utils::get_current_date_string();
        self.tasks
            .iter()
            .map(|t| {
                let mut task = Task::new(t.content.to_string(), t.column_id);
                task.tags = t.tags.iter().map(|tag| tag.to_string()).collect();
                task.due_date = Some(today.clone());
                task
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_split_templates() {
        assert_eq!(list(None).count(), 6);
        assert_eq!(list(Some(Category::Dao)).count(), 2);
        assert_eq!(list(Some(Category::Engineering)).count(), 2);
        assert_eq!(list(Some(Category::Growth)).count(), 2);
    }

    #[test]
    fn test_instantiate_gives_fresh_ids() {
        let template = find("token launch roadmap").unwrap();
        let tasks = template.instantiate();
        assert_eq!(tasks.len(), 4);
        assert_eq!(tasks[0].column_id, ColumnId::Done);
        assert_ne!(tasks[0].id, tasks[1].id);
        assert!(tasks.iter().all(|t| t.due_date.is_some()));

        let again = template.instantiate();
        assert_ne!(tasks[0].id, again[0].id);
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("dao".parse::<Category>().unwrap(), Category::Dao);
        assert!("marketing".parse::<Category>().is_err());
    }
}
