use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregate::{ClassRule, Classifier, GroupBy, Metric, aggregate};
use crate::clean::DedupeStrategy;
use crate::config::{KeepPolicy, ReportConfig};
use crate::errors::{ReportError, ReportResult};
use crate::model::{RecordSet, ReportTable};

static SAFE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("id regex"));

/// One table of a report page: what to group by, what to measure, how to dedupe first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
  pub id: String,
  pub title: String,
  pub key_column: String,
  pub value_column: String,
  pub group_by: GroupBy,
  pub metric: Metric,
  #[serde(default)]
  pub dedupe: DedupeStrategy,
  /// Only records flagged as members contribute.
  #[serde(default)]
  pub member_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSpec {
  pub id: String,
  pub title: String,
  pub tables: Vec<TableSpec>,
}

pub struct PageTables {
  pub tables: Vec<ReportTable>,
  pub warnings: Vec<String>,
}

fn table(id: &str, title: &str, key: &str, value: &str, group_by: GroupBy, metric: Metric) -> TableSpec {
  TableSpec {
    id: id.into(),
    title: title.into(),
    key_column: key.into(),
    value_column: value.into(),
    group_by,
    metric,
    dedupe: DedupeStrategy::None,
    member_only: false,
  }
}

fn field(name: &str) -> GroupBy {
  GroupBy::Field(name.into())
}

fn rule(label: &str, contains: &[&str]) -> ClassRule {
  ClassRule {
    label: label.into(),
    contains: contains.iter().map(|s| s.to_string()).collect(),
    fields: None,
  }
}

fn youth_development_classifier() -> Classifier {
  const COMMUNITY: &str = "YDE - Community Services";
  let mut music = rule(COMMUNITY, &["Music Resource Center"]);
  music.fields = Some(vec!["branch".into()]);
  Classifier {
    fields: vec!["project".into(), "category".into()],
    rules: vec![
      music,
      rule(
        COMMUNITY,
        &[
          "Community Services",
          "Community",
          "Food Distribution",
          "Marketplace",
          "Food Bank",
          "Community Outreach",
          "Social Services",
          "Music Resource Center",
        ],
      ),
      rule(
        "YDE - Early Learning Centers",
        &[
          "Early Learning",
          "Childcare",
          "Preschool",
          "Daycare",
          "Early Childhood",
          "Kids Club",
          "Child Development",
          "Toddler",
          "Infant",
        ],
      ),
      rule(
        "YDE - Out of School Time",
        &[
          "After School",
          "Summer Camp",
          "Youth Programs",
          "Teen Programs",
          "School Age",
          "OST",
          "Out of School",
          "Youth Development",
          "Teen",
          "Achievers",
          "Career Cluster",
          "Service Learning",
        ],
      ),
    ],
    fallback: None,
  }
}

fn senior_centers_classifier() -> Classifier {
  Classifier {
    fields: vec!["branch".into()],
    rules: vec![
      rule("Clippard YMCA + Clippard Senior Center", &["clippard"]),
      rule("R.C. Durr YMCA + Kentucky Senior Center", &["r.c. durr", "rc durr", "durr"]),
      rule("Other Senior Centers", &["senior"]),
    ],
    fallback: None,
  }
}

/// Report layouts shipped with the tool. A config file may replace the whole list.
pub fn builtin_pages() -> Vec<PageSpec> {
  let yde = GroupBy::Classify(youth_development_classifier());
  let senior = GroupBy::Classify(senior_centers_classifier());

  vec![
    PageSpec {
      id: "project-statistics".into(),
      title: "Project Statistics".into(),
      tables: vec![
        table("hours", "Hours by Project Tag", "Project Tag", "Total Hours", field("category"), Metric::Hours),
        TableSpec {
          dedupe: DedupeStrategy::AssigneeCategoryBranch,
          ..table("volunteers", "Volunteers by Project Tag", "Project Tag", "Unique Volunteers", field("category"), Metric::Records)
        },
        table(
          "projects",
          "Projects by Project Tag",
          "Project Tag",
          "Unique Projects",
          field("category"),
          Metric::Distinct("project".into()),
        ),
      ],
    },
    PageSpec {
      id: "branch-breakdown".into(),
      title: "Branch Breakdown".into(),
      tables: vec![
        table("hours", "Hours by Branch", "Branch", "Total Hours", field("branch"), Metric::Hours),
        TableSpec {
          dedupe: DedupeStrategy::AssigneeBranch,
          ..table("active-volunteers", "Active Volunteers by Branch", "Branch", "Active Volunteers", field("branch"), Metric::Records)
        },
        TableSpec {
          dedupe: DedupeStrategy::AssigneeBranch,
          member_only: true,
          ..table("member-volunteers", "Member Volunteers by Branch", "Branch", "Member Volunteers", field("branch"), Metric::Records)
        },
      ],
    },
    PageSpec {
      id: "youth-development".into(),
      title: "Youth Development & Education".into(),
      tables: vec![
        table("hours", "YDE Hours", "YDE Category", "Total Hours", yde.clone(), Metric::Hours),
        table("volunteers", "YDE Volunteers", "YDE Category", "Unique Volunteers", yde.clone(), Metric::Distinct("assignee".into())),
        table("projects", "YDE Projects", "YDE Category", "Unique Projects", yde, Metric::Distinct("project".into())),
      ],
    },
    PageSpec {
      id: "senior-centers".into(),
      title: "Senior Centers".into(),
      tables: vec![
        table("hours", "Senior Center Hours", "Senior Center", "Total Hours", senior.clone(), Metric::Hours),
        table("volunteers", "Senior Center Volunteers", "Senior Center", "Unique Volunteers", senior.clone(), Metric::Distinct("assignee".into())),
        table("branches", "Senior Center Branches", "Senior Center", "Unique Branches", senior, Metric::Distinct("branch".into())),
      ],
    },
  ]
}

fn check_page(page: &PageSpec) -> ReportResult<()> {
  if !SAFE_ID.is_match(&page.id) {
    return Err(ReportError::Validation(format!(
      "page id '{}' must be lowercase letters, digits, '-' or '_'",
      page.id
    )));
  }
  let mut seen = BTreeSet::new();
  for t in &page.tables {
    if !SAFE_ID.is_match(&t.id) || t.id == "summary" {
      return Err(ReportError::Validation(format!(
        "table id '{}' on page '{}' must be lowercase letters, digits, '-' or '_' and not 'summary'",
        t.id, page.id
      )));
    }
    if !seen.insert(t.id.as_str()) {
      return Err(ReportError::Validation(format!("duplicate table id '{}' on page '{}'", t.id, page.id)));
    }
  }
  Ok(())
}

/// Pages to run: the requested ids in order, or every configured page when none are named.
pub fn select_pages(requested: &[String], cfg: &ReportConfig) -> ReportResult<Vec<PageSpec>> {
  let available = cfg.pages.clone().unwrap_or_else(builtin_pages);
  for p in &available {
    check_page(p)?;
  }
  if requested.is_empty() {
    return Ok(available);
  }
  requested
    .iter()
    .map(|id| {
      available
        .iter()
        .find(|p| &p.id == id)
        .cloned()
        .ok_or_else(|| {
          ReportError::Validation(format!(
            "unknown page '{}'; expected one of: {}",
            id,
            available.iter().map(|p| p.id.as_str()).collect::<Vec<_>>().join(", ")
          ))
        })
    })
    .collect()
}

pub fn run_table(spec: &TableSpec, records: &RecordSet, keep: KeepPolicy) -> ReportResult<(ReportTable, Vec<String>)> {
  let members;
  let input = if spec.member_only {
    let kept = records.records().iter().filter(|r| r.member == Some(true)).cloned().collect();
    members = RecordSet::new(records.origin(), kept);
    &members
  } else {
    records
  };

  let agg = aggregate(input, &spec.group_by, &spec.metric, spec.dedupe, keep)?;
  let table = ReportTable::from_groups(&spec.id, &spec.title, &spec.key_column, &spec.value_column, agg.groups);
  let warnings = agg.warnings.into_iter().map(|w| format!("{}: {}", spec.id, w)).collect();
  Ok((table, warnings))
}

pub fn run_page(page: &PageSpec, records: &RecordSet, keep: KeepPolicy) -> ReportResult<PageTables> {
  let mut tables = Vec::with_capacity(page.tables.len());
  let mut warnings = Vec::new();
  for spec in &page.tables {
    let (t, w) = run_table(spec, records, keep)?;
    info!(page = %page.id, table = %t.id, groups = t.rows.len(), "built table");
    tables.push(t);
    warnings.extend(w);
  }
  Ok(PageTables { tables, warnings })
}
