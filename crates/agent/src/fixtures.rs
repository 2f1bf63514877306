//! Demo catalog and the conversation sequences every build must satisfy.
//!
//! The CLI `scenario` command and the acceptance tests both run these.

use rust_decimal::Decimal;
use serde::Serialize;

use shelfbot_core::context::ConversationContext;
use shelfbot_core::domain::product::ProductRecord;
use shelfbot_core::errors::ApplicationError;
use shelfbot_core::resolution::ResolutionOutcome;
use shelfbot_core::text;

use crate::runtime::ResolutionService;
use crate::session::{SessionId, SessionStore};

pub fn demo_catalog() -> Vec<ProductRecord> {
    vec![
        ProductRecord::new("Mochila", "K78").with_price(Decimal::new(12990, 0)).with_stock(14),
        ProductRecord::new("Mochila Antirrobo", "K80").with_price(Decimal::new(24990, 0)),
        ProductRecord::new("Llavero Camion", "B85")
            .with_price(Decimal::new(1990, 0))
            .with_stock(120),
        ProductRecord::new("Llavero Metálico Destapador", "B90").with_stock(40),
        ProductRecord::new("Llavero Linterna", ""),
        ProductRecord::new("Tazón Mug", "T12").with_price(Decimal::new(4990, 0)),
        ProductRecord::new("Tazón Cerveza", "T13"),
        ProductRecord::new("Taza Cerámica Blanca", "T20").with_stock(0),
        ProductRecord::new("Taza Esmaltada", ""),
        ProductRecord::new("Bolígrafo Bamboo", "L39").with_price(Decimal::new(890, 0)),
        ProductRecord::new("Libreta Ecológica", "N10"),
        ProductRecord::new("Polera Algodón", "P01"),
    ]
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "expect", rename_all = "snake_case")]
pub enum Expectation {
    /// Found exactly this product.
    Found { sku: &'static str },
    /// Found or ambiguous, every product of this type. Never not found.
    WithinType { type_token: &'static str },
    /// Found by carrying the previous anchor over.
    CarriedOver { sku: &'static str },
    /// Anything except an answer that points at this product.
    NotProduct { sku: &'static str },
    NotFound,
}

impl Expectation {
    pub fn evaluate(&self, outcome: &ResolutionOutcome) -> Result<(), String> {
        match self {
            Self::Found { sku } => match outcome.found_product() {
                Some(product) if product.sku == *sku => Ok(()),
                _ => Err(format!("expected found {sku}, got {}", describe(outcome))),
            },
            Self::WithinType { type_token } => {
                let expected = text::stem(type_token);
                let products = outcome.products();
                let within = !products.is_empty()
                    && products
                        .iter()
                        .all(|product| product.type_stem() == Some(expected.as_str()));
                if within {
                    Ok(())
                } else {
                    Err(format!("expected only {type_token} products, got {}", describe(outcome)))
                }
            }
            Self::CarriedOver { sku } => {
                let carried =
                    matches!(outcome, ResolutionOutcome::Found(found) if found.carried_over)
                    && outcome.found_product().is_some_and(|product| product.sku == *sku);
                if carried {
                    Ok(())
                } else {
                    Err(format!("expected {sku} carried over, got {}", describe(outcome)))
                }
            }
            Self::NotProduct { sku } => {
                if outcome.products().iter().any(|product| product.sku == *sku) {
                    Err(format!("stale product {sku} reused: {}", describe(outcome)))
                } else {
                    Ok(())
                }
            }
            Self::NotFound => {
                if outcome.is_not_found() {
                    Ok(())
                } else {
                    Err(format!("expected not found, got {}", describe(outcome)))
                }
            }
        }
    }
}

fn describe(outcome: &ResolutionOutcome) -> String {
    let names: Vec<&str> = outcome.products().iter().map(|product| product.name.as_str()).collect();
    if names.is_empty() {
        outcome.label().to_string()
    } else {
        format!("{} [{}]", outcome.label(), names.join(", "))
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ScenarioStep {
    pub query: &'static str,
    pub expect: Vec<Expectation>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Scenario {
    pub name: &'static str,
    pub steps: Vec<ScenarioStep>,
}

fn step(query: &'static str, expect: Vec<Expectation>) -> ScenarioStep {
    ScenarioStep { query, expect }
}

/// Conversation sequences checked against [`demo_catalog`].
pub fn acceptance_scenarios() -> Vec<Scenario> {
    use Expectation::*;

    vec![
        Scenario {
            name: "mochila_then_tazones",
            steps: vec![
                step("tienen mochila?", vec![Found { sku: "K78" }]),
                step(
                    "tienes tazones?",
                    vec![WithinType { type_token: "tazon" }, NotProduct { sku: "K78" }],
                ),
            ],
        },
        Scenario {
            name: "compound_qualifier",
            steps: vec![
                step("tienen mochila?", vec![Found { sku: "K78" }]),
                step("tienen mochilas cocina?", vec![NotProduct { sku: "K78" }, NotFound]),
            ],
        },
        Scenario {
            name: "llaveros_then_metalico",
            steps: vec![
                step("tienen llaveros?", vec![WithinType { type_token: "llavero" }]),
                step(
                    "tienes llavero metálico?",
                    vec![Found { sku: "B90" }, WithinType { type_token: "llavero" }],
                ),
            ],
        },
        Scenario {
            name: "cold_modifier",
            steps: vec![step("llavero metálico", vec![WithinType { type_token: "llavero" }])],
        },
        Scenario {
            name: "sku_bypasses_ambiguity",
            steps: vec![
                step("tienen llaveros?", vec![WithinType { type_token: "llavero" }]),
                step("sku: B85", vec![Found { sku: "B85" }]),
            ],
        },
        Scenario {
            name: "pure_follow_up",
            steps: vec![
                step("tienen mochila?", vec![Found { sku: "K78" }]),
                step("y el precio?", vec![CarriedOver { sku: "K78" }]),
            ],
        },
        Scenario {
            name: "empty_sku_never_matches",
            steps: vec![step("sku: ", vec![NotFound]), step("\"\"", vec![NotFound])],
        },
    ]
}

#[derive(Clone, Debug, Serialize)]
pub struct StepReport {
    pub query: &'static str,
    pub outcome: &'static str,
    pub passed: bool,
    pub failures: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ScenarioReport {
    pub name: &'static str,
    pub passed: bool,
    pub steps: Vec<StepReport>,
}

/// Run one scenario in a fresh session of its own.
pub async fn run_scenario<S>(
    service: &ResolutionService<S>,
    scenario: &Scenario,
) -> Result<ScenarioReport, ApplicationError>
where
    S: SessionStore,
{
    let session_id = SessionId::parse(&format!("scenario-{}", scenario.name))?;
    service.sessions().save(&session_id, ConversationContext::new()).await?;

    let mut steps = Vec::with_capacity(scenario.steps.len());
    for step in &scenario.steps {
        let report = service.resolve(&session_id, step.query).await?;
        let failures: Vec<String> = step
            .expect
            .iter()
            .filter_map(|expectation| expectation.evaluate(&report.outcome).err())
            .collect();
        steps.push(StepReport {
            query: step.query,
            outcome: report.outcome.label(),
            passed: failures.is_empty(),
            failures,
        });
    }

    service.end_session(&session_id).await?;
    Ok(ScenarioReport {
        name: scenario.name,
        passed: steps.iter().all(|step| step.passed),
        steps,
    })
}

#[cfg(test)]
mod tests {
    use shelfbot_core::catalog::CatalogIndex;
    use shelfbot_core::context::ConversationContext;
    use shelfbot_core::resolution::Resolver;

    use super::{demo_catalog, Expectation};

    #[test]
    fn demo_catalog_has_blank_skus_and_shared_types() {
        let index = CatalogIndex::from_records(demo_catalog());

        assert_eq!(index.diagnostics().skipped_empty_skus, 2);
        assert!(index.diagnostics().duplicate_skus.is_empty());
        assert_eq!(index.lookup_by_type("llaveros").len(), 3);
    }

    #[test]
    fn expectations_reject_wrong_outcomes() {
        let index = CatalogIndex::from_records(demo_catalog());
        let resolution =
            Resolver::default().resolve("tienen mochila?", &ConversationContext::new(), &index);

        assert!(Expectation::Found { sku: "K78" }.evaluate(&resolution.outcome).is_ok());
        assert!(Expectation::Found { sku: "K80" }.evaluate(&resolution.outcome).is_err());
        assert!(Expectation::NotProduct { sku: "K78" }.evaluate(&resolution.outcome).is_err());
        assert!(Expectation::NotFound.evaluate(&resolution.outcome).is_err());
        assert!(Expectation::CarriedOver { sku: "K78" }.evaluate(&resolution.outcome).is_err());
    }
}
