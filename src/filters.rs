use crate::models::{Lead, LeadFilters, SortKey, SortOrder};
use std::cmp::Ordering;
use std::collections::BTreeSet;

pub fn filter_leads(leads: &[Lead], filters: &LeadFilters) -> Vec<Lead> {
    let needle = filters.search.to_lowercase();
    let mut filtered = leads
        .iter()
        .filter(|lead| matches_search(lead, &needle))
        .filter(|lead| filters.status.is_empty() || lead.status == filters.status)
        .filter(|lead| filters.source.is_empty() || lead.source == filters.source)
        .cloned()
        .collect::<Vec<_>>();

    // `sort_by` is stable, equal keys keep fixture order in both directions.
    filtered.sort_by(|a, b| {
        let ordering = compare_by(filters.sort_by, a, b);
        match filters.sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });

    filtered
}

pub fn unique_statuses(leads: &[Lead]) -> Vec<String> {
    distinct(leads.iter().map(|lead| lead.status.as_str()))
}

pub fn unique_sources(leads: &[Lead]) -> Vec<String> {
    distinct(leads.iter().map(|lead| lead.source.as_str()))
}

fn matches_search(lead: &Lead, needle: &str) -> bool {
    needle.is_empty()
        || lead.name.to_lowercase().contains(needle)
        || lead.company.to_lowercase().contains(needle)
}

fn compare_by(key: SortKey, a: &Lead, b: &Lead) -> Ordering {
    match key {
        SortKey::Score => a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal),
        SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortKey::Company => a.company.to_lowercase().cmp(&b.company.to_lowercase()),
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(ToString::to_string)
        .collect()
}
