//! Identifier resolution against a live catalog.
//!
//! Users type names the way they remember them: unqualified, in whatever
//! case. Catalogs store them fully qualified, in their own convention. A
//! [`ResolutionStrategy`] expands a partial name into an ordered list of
//! fully-qualified candidates, and [`resolve`] probes those candidates one
//! at a time until the catalog confirms one.
//!
//! Probing is strictly sequential and stops at the first match, so the
//! result does not depend on probe latency. There are no retries: a probe
//! that returns `None` (or fails internally) advances to the next candidate.
//!
//! # Examples
//!
//! ```
//! use db_schema_core::{CaseFolding, CaseFoldingStrategy, Identifier, IdentifierDefaults, resolve};
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let defaults = IdentifierDefaults::new().with_schema("main");
//! let strategy = CaseFoldingStrategy::new(CaseFolding::Lower);
//! let name = Identifier::new("Users").unwrap();
//!
//! let found = resolve(&name, &defaults, &strategy, |candidate| async move {
//!     (candidate.local_name() == "users").then_some(())
//! }, &CancellationToken::new())
//! .await
//! .unwrap();
//!
//! assert_eq!(found.unwrap().to_string(), "main.users");
//! # });
//! ```

use std::future::Future;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::identifier::{CaseFolding, Identifier, IdentifierComparer, IdentifierDefaults};

/// Errors raised by [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The cancellation token fired before a candidate matched.
    #[error("identifier resolution for '{0}' was cancelled")]
    Cancelled(String),
}

/// Produces the fully-qualified candidates worth probing for a name.
///
/// Implementations must be deterministic: the same input and defaults
/// always yield the same candidates in the same order, most likely first.
pub trait ResolutionStrategy: Send + Sync {
    fn resolution_order(
        &self,
        identifier: &Identifier,
        defaults: &IdentifierDefaults,
    ) -> Vec<Identifier>;
}

/// Strategy for case-sensitive catalogs: a single, verbatim candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatchStrategy;

impl ResolutionStrategy for ExactMatchStrategy {
    fn resolution_order(
        &self,
        identifier: &Identifier,
        defaults: &IdentifierDefaults,
    ) -> Vec<Identifier> {
        vec![identifier.qualify(defaults)]
    }
}

/// Strategy for catalogs that fold unquoted names to a fixed case.
///
/// Candidates, in order:
///
/// 1. the input qualified with the defaults, as typed;
/// 2. the same with the local name folded, if that changes it;
/// 3. the same with an explicitly typed schema folded as well, if that
///    changes it.
#[derive(Debug, Clone, Copy)]
pub struct CaseFoldingStrategy {
    folding: CaseFolding,
}

impl CaseFoldingStrategy {
    pub fn new(folding: CaseFolding) -> Self {
        Self { folding }
    }

    pub fn folding(&self) -> CaseFolding {
        self.folding
    }
}

impl ResolutionStrategy for CaseFoldingStrategy {
    fn resolution_order(
        &self,
        identifier: &Identifier,
        defaults: &IdentifierDefaults,
    ) -> Vec<Identifier> {
        let as_given = identifier.qualify(defaults);
        let mut candidates = vec![as_given.clone()];

        let folded_local = self.folding.fold(identifier.local_name());
        let Ok(local_folded) = as_given.with_local_name(folded_local) else {
            return candidates;
        };
        push_distinct(&mut candidates, local_folded.clone());

        if let Some(schema) = identifier.schema() {
            let fully_folded = local_folded.with_schema(self.folding.fold(schema));
            push_distinct(&mut candidates, fully_folded);
        }

        candidates
    }
}

fn push_distinct(candidates: &mut Vec<Identifier>, candidate: Identifier) {
    if !candidates
        .iter()
        .any(|c| IdentifierComparer::Ordinal.equals(c, &candidate))
    {
        candidates.push(candidate);
    }
}

/// Resolves `identifier` to the first candidate the probe confirms.
///
/// Returns `Ok(None)` when every candidate was probed without success.
///
/// # Errors
///
/// Returns [`ResolveError::Cancelled`] if `cancel` fires before a match;
/// an in-flight probe is dropped.
pub async fn resolve<F, Fut, T>(
    identifier: &Identifier,
    defaults: &IdentifierDefaults,
    strategy: &dyn ResolutionStrategy,
    probe: F,
    cancel: &CancellationToken,
) -> Result<Option<Identifier>, ResolveError>
where
    F: FnMut(Identifier) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let resolved = resolve_with_value(identifier, defaults, strategy, probe, cancel).await?;
    Ok(resolved.map(|(candidate, _)| candidate))
}

/// Like [`resolve`], but also returns the value produced by the successful
/// probe.
///
/// # Errors
///
/// Returns [`ResolveError::Cancelled`] if `cancel` fires before a match.
pub async fn resolve_with_value<F, Fut, T>(
    identifier: &Identifier,
    defaults: &IdentifierDefaults,
    strategy: &dyn ResolutionStrategy,
    mut probe: F,
    cancel: &CancellationToken,
) -> Result<Option<(Identifier, T)>, ResolveError>
where
    F: FnMut(Identifier) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let candidates = strategy.resolution_order(identifier, defaults);

    for (attempt, candidate) in candidates.into_iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(ResolveError::Cancelled(identifier.to_string()));
        }

        debug!(identifier = %identifier, attempt, candidate = %candidate, "Probing candidate");
        let found = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(ResolveError::Cancelled(identifier.to_string()));
            }
            found = probe(candidate.clone()) => found,
        };

        if let Some(value) = found {
            debug!(identifier = %identifier, resolved = %candidate, "Resolved identifier");
            return Ok(Some((candidate, value)));
        }
    }

    debug!(identifier = %identifier, "No candidate matched");
    Ok(None)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    fn names(candidates: &[Identifier]) -> Vec<String> {
        candidates.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_exact_match_single_candidate() {
        let defaults = IdentifierDefaults::new().with_schema("dbo");
        let id = Identifier::new("Orders").unwrap();
        let order = ExactMatchStrategy.resolution_order(&id, &defaults);
        assert_eq!(names(&order), vec!["dbo.Orders"]);
    }

    #[test]
    fn test_case_folding_order() {
        let defaults = IdentifierDefaults::new().with_schema("main");
        let strategy = CaseFoldingStrategy::new(CaseFolding::Lower);

        let id = Identifier::new("Users").unwrap();
        assert_eq!(
            names(&strategy.resolution_order(&id, &defaults)),
            vec!["main.Users", "main.users"]
        );

        let id = Identifier::new("users").unwrap();
        assert_eq!(
            names(&strategy.resolution_order(&id, &defaults)),
            vec!["main.users"]
        );

        let id = Identifier::parse("Sales.Orders").unwrap();
        assert_eq!(
            names(&strategy.resolution_order(&id, &defaults)),
            vec!["Sales.Orders", "Sales.orders", "sales.orders"]
        );
    }

    #[test]
    fn test_upper_folding() {
        let strategy = CaseFoldingStrategy::new(CaseFolding::Upper);
        let id = Identifier::new("emp").unwrap();
        let order = strategy.resolution_order(&id, &IdentifierDefaults::new().with_schema("HR"));
        assert_eq!(names(&order), vec!["HR.emp", "HR.EMP"]);
    }

    #[tokio::test]
    async fn test_resolve_stops_at_first_match() {
        let defaults = IdentifierDefaults::new().with_schema("main");
        let strategy = CaseFoldingStrategy::new(CaseFolding::Lower);
        let id = Identifier::new("Users").unwrap();
        let probed = RefCell::new(Vec::new());

        let found = resolve(
            &id,
            &defaults,
            &strategy,
            |candidate| {
                probed.borrow_mut().push(candidate.to_string());
                let hit = candidate.schema() == Some("main") && candidate.local_name() == "users";
                async move { hit.then_some(()) }
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(found.unwrap().to_string(), "main.users");
        assert_eq!(*probed.borrow(), vec!["main.Users", "main.users"]);
    }

    #[tokio::test]
    async fn test_resolve_no_further_probing_after_match() {
        let defaults = IdentifierDefaults::new();
        let strategy = CaseFoldingStrategy::new(CaseFolding::Lower);
        let id = Identifier::parse("Sales.Orders").unwrap();
        let calls = RefCell::new(0usize);

        let found = resolve_with_value(
            &id,
            &defaults,
            &strategy,
            |_candidate| {
                *calls.borrow_mut() += 1;
                async { Some(42) }
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let (candidate, value) = found.unwrap();
        assert_eq!(candidate.to_string(), "Sales.Orders");
        assert_eq!(value, 42);
        assert_eq!(*calls.borrow(), 1);
    }

    #[tokio::test]
    async fn test_resolve_exhausted_is_none() {
        let defaults = IdentifierDefaults::new().with_schema("main");
        let strategy = CaseFoldingStrategy::new(CaseFolding::Lower);
        let id = Identifier::new("Missing").unwrap();

        let found = resolve(
            &id,
            &defaults,
            &strategy,
            |_candidate| async { None::<()> },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_resolve_honors_cancellation() {
        let strategy = CaseFoldingStrategy::new(CaseFolding::Lower);
        let id = Identifier::new("Users").unwrap();
        let cancel = CancellationToken::new();
        let calls = RefCell::new(0usize);

        let result = resolve(
            &id,
            &IdentifierDefaults::new(),
            &strategy,
            |_candidate| {
                *calls.borrow_mut() += 1;
                cancel.cancel();
                async { None::<()> }
            },
            &cancel,
        )
        .await;

        assert!(matches!(result, Err(ResolveError::Cancelled(_))));
        assert_eq!(*calls.borrow(), 1);
    }

    #[tokio::test]
    async fn test_resolve_cancels_pending_probe() {
        let strategy = ExactMatchStrategy;
        let id = Identifier::new("slow").unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let result = resolve(
            &id,
            &IdentifierDefaults::new(),
            &strategy,
            move |_candidate| {
                trigger.cancel();
                std::future::pending::<Option<()>>()
            },
            &cancel,
        )
        .await;

        assert!(matches!(result, Err(ResolveError::Cancelled(_))));
    }
}
