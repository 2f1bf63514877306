use std::sync::Arc;

use shelfbot_agent::fixtures::{acceptance_scenarios, demo_catalog, run_scenario};
use shelfbot_agent::{
    CatalogHandle, InMemorySessionStore, ResolutionService, SessionId, StaticCatalogProvider,
};
use shelfbot_core::context::{Anchor, ContextState};
use shelfbot_core::resolution::{ResolutionOutcome, Resolver};

async fn demo_service() -> ResolutionService<InMemorySessionStore> {
    let handle = Arc::new(CatalogHandle::default());
    handle
        .refresh(&StaticCatalogProvider::new(demo_catalog()))
        .await
        .expect("demo catalog loads");
    ResolutionService::new(Resolver::default(), handle, InMemorySessionStore::default())
}

fn session(raw: &str) -> SessionId {
    SessionId::parse(raw).expect("valid session id")
}

#[tokio::test]
async fn every_acceptance_scenario_passes() {
    let service = demo_service().await;

    for scenario in acceptance_scenarios() {
        let report = run_scenario(&service, &scenario).await.expect("scenario runs");
        let failures: Vec<&String> =
            report.steps.iter().flat_map(|step| step.failures.iter()).collect();
        assert!(report.passed, "scenario {} failed: {failures:?}", scenario.name);
    }
    assert!(service.sessions().is_empty().await);
}

#[tokio::test]
async fn end_to_end_conversation_keeps_and_drops_context() {
    let service = demo_service().await;
    let chat = session("whatsapp-56911112222");

    let mochila = service.resolve(&chat, "tienen mochila?").await.expect("turn 1");
    assert_eq!(mochila.outcome.found_product().map(|p| p.sku.as_str()), Some("K78"));

    let tazones = service.resolve(&chat, "tienes tazones?").await.expect("turn 2");
    assert!(tazones.outcome.products().iter().all(|p| p.sku != "K78"));
    assert!(!tazones.outcome.products().is_empty());

    let llaveros = service.resolve(&chat, "tienen llaveros?").await.expect("turn 3");
    assert_eq!(
        llaveros.context.state,
        ContextState::Anchored {
            anchor: Anchor::Category { type_token: "llavero".to_string() },
            term: vec!["llaveros".to_string()],
        }
    );

    let metalico = service.resolve(&chat, "tienes llavero metálico?").await.expect("turn 4");
    assert_eq!(metalico.outcome.found_product().map(|p| p.sku.as_str()), Some("B90"));

    let by_sku = service.resolve(&chat, "sku: T13").await.expect("turn 5");
    assert_eq!(by_sku.outcome.found_product().map(|p| p.name.as_str()), Some("Tazón Cerveza"));
    assert_eq!(by_sku.context.turn, 5);
}

#[tokio::test]
async fn refreshed_catalog_drops_vanished_anchor() {
    let service = demo_service().await;
    let chat = session("chat-refresh");

    service.resolve(&chat, "sku: K80").await.expect("anchor");
    let remaining: Vec<_> =
        demo_catalog().into_iter().filter(|record| record.sku.as_deref() != Some("K80")).collect();
    service.catalog().replace(remaining);

    let report = service.resolve(&chat, "y el precio?").await.expect("follow-up");
    assert_eq!(report.outcome, ResolutionOutcome::NotFound);
    assert_eq!(report.context.state, ContextState::Empty);
}

#[tokio::test]
async fn degraded_catalog_still_answers_from_last_snapshot() {
    struct DownProvider;

    #[async_trait::async_trait]
    impl shelfbot_agent::CatalogProvider for DownProvider {
        fn name(&self) -> &'static str {
            "down"
        }

        async fn get_all_products(
            &self,
        ) -> Result<Vec<shelfbot_core::ProductRecord>, shelfbot_core::CatalogError> {
            Err(shelfbot_core::CatalogError::Unavailable("connection refused".to_string()))
        }
    }

    let service = demo_service().await;
    assert!(service.catalog().refresh(&DownProvider).await.is_err());

    let report = service.resolve(&session("chat-degraded"), "sku: B85").await.expect("resolve");
    assert!(report.degraded);
    assert_eq!(report.outcome.found_product().map(|p| p.sku.as_str()), Some("B85"));
}
