//! services/eligibility_service.rs
//! Resolver de elegibilidad: qué contactos todavía no recibieron una
//! plantilla. Sin efectos secundarios; se puede llamar concurrentemente.

use std::collections::HashSet;

use anyhow::Result;

use crate::models::contact_model::ContactRecord;
use crate::services::ledger_service::LedgerService;

#[derive(Clone)]
pub struct EligibilityService {
    ledger: LedgerService,
}

impl EligibilityService {
    pub fn new(ledger: LedgerService) -> Self {
        EligibilityService { ledger }
    }

    /// Devuelve (seleccionados, total_elegibles). `selected` preserva el
    /// orden de entrada y respeta `limit`; `total_eligible` es siempre el
    /// conteo completo, para poder mostrar "se enviará N de M".
    pub async fn resolve(
        &self,
        template_name: &str,
        recipients: &[ContactRecord],
        limit: Option<i64>,
    ) -> Result<(Vec<ContactRecord>, usize)> {
        let fulfilled = self.ledger.fulfilled_phones(template_name).await?;
        Ok(filter_eligible(recipients, &fulfilled, limit))
    }
}

/// Núcleo puro del resolver: diferencia de conjuntos con orden estable.
/// limit ausente o <= 0 significa sin tope.
pub fn filter_eligible(
    recipients: &[ContactRecord],
    fulfilled: &HashSet<String>,
    limit: Option<i64>,
) -> (Vec<ContactRecord>, usize) {
    let eligible: Vec<ContactRecord> = recipients
        .iter()
        .filter(|c| !fulfilled.contains(&c.phone))
        .cloned()
        .collect();

    let total_eligible = eligible.len();

    let selected = match limit {
        Some(l) if l > 0 => eligible.into_iter().take(l as usize).collect(),
        _ => eligible,
    };

    (selected, total_eligible)
}
