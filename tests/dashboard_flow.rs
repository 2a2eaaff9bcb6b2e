use lead_desk_lib::{
    open_dashboard, AppError, LeadPatch, LoadState, OpportunityStage, SortKey, SortOrder, StoreConfig,
};
use std::path::PathBuf;

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/leads.json")
}

fn instant_config(failure_rate: f64) -> StoreConfig {
    let yaml = format!(
        "fixturePath: {}\nfailureRate: {}\nlatency:\n  loadMs: 0\n  updateMs: 0\n  convertMs: 0\n",
        fixture_path().display(),
        failure_rate
    );
    StoreConfig::from_yaml_str(&yaml).expect("config")
}

fn ids(leads: &[lead_desk_lib::Lead]) -> Vec<i64> {
    leads.iter().map(|lead| lead.id).collect()
}

#[test]
fn fixture_exists() {
    assert!(fixture_path().exists());
}

#[tokio::test]
async fn fixture_loads_with_score_descending_default() {
    let store = open_dashboard(&instant_config(0.0)).await.expect("open");
    assert_eq!(store.load_state(), LoadState::Ready);

    let view = store.view();
    assert!(!view.loading);
    assert!(view.error.is_none());
    assert_eq!(view.total_leads, 6);
    assert_eq!(ids(&view.leads), vec![1, 3, 6, 2, 4, 5]);
    assert_eq!(
        view.status_options,
        vec!["Contacted", "New", "Qualified", "Unqualified"]
    );
    assert_eq!(
        view.source_options,
        vec!["Cold Call", "Event", "Referral", "Website"]
    );
}

#[tokio::test]
async fn filters_narrow_and_reorder_the_list() {
    let store = open_dashboard(&instant_config(0.0)).await.expect("open");

    store.update_filters(|filters| filters.search = "ACME".to_string());
    assert_eq!(ids(&store.visible_leads()), vec![1, 4]);

    store.update_filters(|filters| {
        filters.search.clear();
        filters.status = "New".to_string();
        filters.source = "Website".to_string();
    });
    assert_eq!(ids(&store.visible_leads()), vec![1]);

    store.update_filters(|filters| {
        filters.status.clear();
        filters.source.clear();
        filters.sort_by = SortKey::Company;
        filters.sort_order = SortOrder::Asc;
    });
    assert_eq!(ids(&store.visible_leads()), vec![1, 4, 6, 3, 5, 2]);
}

#[tokio::test]
async fn conversion_flow_keeps_the_lead_list_intact() {
    let store = open_dashboard(&instant_config(0.0)).await.expect("open");
    let before = store.all_leads();
    let carla = store.lead(3).expect("lead 3");

    let opportunity = store
        .convert_to_opportunity(&carla, Some(18_000.0))
        .await
        .expect("convert");
    assert_eq!(opportunity.account_name, carla.company);
    assert_eq!(opportunity.lead_id, carla.id);
    assert_eq!(opportunity.stage, OpportunityStage::Prospecting);
    assert_eq!(store.all_leads(), before);
    assert_eq!(store.view().opportunities, vec![opportunity]);
}

#[tokio::test]
async fn rejected_writes_roll_back_and_create_nothing() {
    let store = open_dashboard(&instant_config(1.0)).await.expect("open");
    let before = store.all_leads();

    let err = store
        .update_lead_and_confirm(2, LeadPatch::status("Qualified"))
        .await
        .expect_err("update rejected");
    assert!(matches!(err, AppError::Update(_)));
    assert_eq!(store.all_leads(), before);

    let bruno = store.lead(2).expect("lead 2");
    assert!(store.convert_to_opportunity(&bruno, None).await.is_err());
    assert!(store.opportunities().is_empty());
}

#[tokio::test]
async fn saved_filters_are_restored_on_next_open() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = instant_config(0.0);
    config.preferences_path = Some(dir.path().join("prefs").join("lead-desk.sqlite"));

    {
        let store = open_dashboard(&config).await.expect("open");
        store.update_filters(|filters| {
            filters.search = "orbital".to_string();
            filters.sort_by = SortKey::Name;
        });
    }

    let store = open_dashboard(&config).await.expect("reopen");
    let filters = store.filters();
    assert_eq!(filters.search, "orbital");
    assert_eq!(filters.sort_by, SortKey::Name);
    assert_eq!(ids(&store.visible_leads()), vec![5]);
}

#[tokio::test]
async fn missing_fixture_surfaces_as_view_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = instant_config(0.0);
    config.fixture_path = dir.path().join("absent.json");

    let store = open_dashboard(&config).await.expect("open");
    let view = store.view();
    assert!(!view.loading);
    assert!(view.error.is_some());
    assert!(view.leads.is_empty());
}
