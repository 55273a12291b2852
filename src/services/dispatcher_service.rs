//! services/dispatcher_service.rs
//! Dispatcher del envío masivo: una sola corrida viva por proceso,
//! cancelación cooperativa y ritmo acotado entre envíos.
//!
//! Todo el estado de la corrida es privado a este servicio; los handlers
//! solo pasan por start/stop/status/preview. El lock del estado se toma
//! para actualizaciones puntuales, nunca a través de una llamada al
//! proveedor o a la base.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use anyhow::Result;
use chrono::Utc;

use crate::config::dispatch_config::DispatchConfig;
use crate::models::contact_model::ContactRecord;
use crate::models::dispatch_model::{
    DispatchPreviewStats, DispatchRun, DispatchStatusResponse, StartDispatchRequest,
    StartDispatchResponse,
};
use crate::services::contact_service::ContactService;
use crate::services::eligibility_service::EligibilityService;
use crate::services::ledger_service::LedgerService;
use crate::services::pacer::Pacer;
use crate::services::provider_service::{TemplateSender, TemplateSpec};
use crate::services::template_settings_service::TemplateSettingsService;

/// Errores que el control surface debe distinguir (400 vs 409 vs 500).
#[derive(Debug)]
pub enum StartDispatchError {
    MissingTemplate,
    Busy,
    NoEligibleRecipients,
    Internal(anyhow::Error),
}

impl fmt::Display for StartDispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartDispatchError::MissingTemplate => write!(f, "template_name es requerido"),
            StartDispatchError::Busy => {
                write!(f, "Ya hay un envío masivo en curso")
            }
            StartDispatchError::NoEligibleRecipients => {
                write!(f, "No hay destinatarios elegibles (todos recibieron la plantilla)")
            }
            StartDispatchError::Internal(e) => write!(f, "Error interno: {e}"),
        }
    }
}

impl std::error::Error for StartDispatchError {}

impl From<anyhow::Error> for StartDispatchError {
    fn from(e: anyhow::Error) -> Self {
        StartDispatchError::Internal(e)
    }
}

struct DispatcherInner {
    running: AtomicBool,
    run: RwLock<DispatchRun>,
    contacts: ContactService,
    ledger: LedgerService,
    eligibility: EligibilityService,
    settings: TemplateSettingsService,
    sender: Arc<dyn TemplateSender>,
    config: DispatchConfig,
}

#[derive(Clone)]
pub struct DispatcherService {
    inner: Arc<DispatcherInner>,
}

impl DispatcherService {
    pub fn new(
        contacts: ContactService,
        ledger: LedgerService,
        eligibility: EligibilityService,
        settings: TemplateSettingsService,
        sender: Arc<dyn TemplateSender>,
        config: DispatchConfig,
    ) -> Self {
        DispatcherService {
            inner: Arc::new(DispatcherInner {
                running: AtomicBool::new(false),
                run: RwLock::new(DispatchRun::default()),
                contacts,
                ledger,
                eligibility,
                settings,
                sender,
                config,
            }),
        }
    }

    /// Arranca una corrida. Si ya hay una viva responde Busy sin encolar.
    /// Devuelve de inmediato; el loop corre en un task de tokio.
    pub async fn start(
        &self,
        req: StartDispatchRequest,
    ) -> Result<StartDispatchResponse, StartDispatchError> {
        let template_name = req.template_name.trim().to_string();
        if template_name.is_empty() {
            return Err(StartDispatchError::MissingTemplate);
        }

        // compare_exchange: dos start simultáneos no pueden pasar ambos.
        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(StartDispatchError::Busy);
        }

        match self.prepare_and_spawn(req, &template_name).await {
            Ok(resp) => Ok(resp),
            Err(e) => {
                // Liberar el guard: la corrida nunca arrancó.
                self.inner.running.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    async fn prepare_and_spawn(
        &self,
        req: StartDispatchRequest,
        template_name: &str,
    ) -> Result<StartDispatchResponse, StartDispatchError> {
        let recipients = self.inner.contacts.list_active_contacts().await?;
        let (selected, total_eligible) = self
            .inner
            .eligibility
            .resolve(template_name, &recipients, req.limit)
            .await?;

        if selected.is_empty() {
            return Err(StartDispatchError::NoEligibleRecipients);
        }

        // Imagen de cabecera: la del request, o la guardada para la plantilla.
        let header_image_id = match req.header_image_id.filter(|s| !s.trim().is_empty()) {
            Some(id) => Some(id),
            None => self.inner.settings.get_header_image_id(template_name).await?,
        };

        let spec = TemplateSpec {
            name: template_name.to_string(),
            language_code: req
                .language_code
                .unwrap_or_else(|| self.inner.config.default_language_code.clone()),
            header_image_id,
        };

        let pacer = Pacer::from_rate(
            req.messages_per_minute
                .unwrap_or(self.inner.config.default_messages_per_minute),
        );

        let selected_count = selected.len();
        {
            let mut run = self.inner.run.write().unwrap();
            run.reset(template_name, selected_count as u64, Utc::now().to_rfc3339());
            run.push_log(format!(
                "Corrida iniciada: {} ({} de {} elegibles)",
                template_name, selected_count, total_eligible
            ));
        }

        log::info!(
            "(start) Envío masivo iniciado: {} -> {} destinatarios ({} elegibles)",
            template_name,
            selected_count,
            total_eligible
        );

        let service = self.clone();
        tokio::spawn(async move {
            service.run_loop(selected, spec, pacer).await;
        });

        Ok(StartDispatchResponse {
            success: true,
            template_name: template_name.to_string(),
            selected: selected_count,
            total_eligible,
            message: "Envío masivo iniciado".to_string(),
        })
    }

    /// El loop de envío. Nunca entra en pánico ni corta por el fallo de un
    /// destinatario: cada error se pliega en el ledger y en el log de la
    /// corrida.
    async fn run_loop(&self, selected: Vec<ContactRecord>, spec: TemplateSpec, pacer: Pacer) {
        let total = selected.len();
        let mut stopped = false;

        for (i, contact) in selected.iter().enumerate() {
            let idx = i + 1;

            // Cancelación cooperativa: se chequea una vez por iteración.
            let stop_requested = { self.inner.run.read().unwrap().stop_requested };
            if stop_requested {
                let mut run = self.inner.run.write().unwrap();
                let current = run.current;
                run.push_log(format!(
                    "Detenido a pedido: {}/{} procesados",
                    current, total
                ));
                stopped = true;
                break;
            }

            let outcome = self
                .inner
                .sender
                .send_template(&contact.phone, &spec)
                .await;

            if outcome.success {
                match self
                    .inner
                    .ledger
                    .record_attempt(&contact.phone, &spec.name, &outcome)
                    .await
                {
                    Ok(()) => {
                        let mut run = self.inner.run.write().unwrap();
                        run.success += 1;
                        run.push_log(format!(
                            "[{}/{}] Enviado a {} ({})",
                            idx, total, contact.name, contact.phone
                        ));
                    }
                    Err(e) => {
                        // Distinto de un fallo del proveedor: el mensaje pudo
                        // salir sin quedar registrado localmente.
                        log::error!(
                            "(run_loop) Fallo de ledger para {}: {:?}",
                            contact.phone,
                            e
                        );
                        let mut run = self.inner.run.write().unwrap();
                        run.failed += 1;
                        run.push_log(format!(
                            "[{}/{}] RIESGO DE CONSISTENCIA: envío a {} ({}) sin registro en ledger: {}",
                            idx, total, contact.name, contact.phone, e
                        ));
                    }
                }
            } else {
                let error_text = outcome
                    .error
                    .clone()
                    .unwrap_or_else(|| "Error desconocido".to_string());

                if let Err(e) = self
                    .inner
                    .ledger
                    .record_attempt(&contact.phone, &spec.name, &outcome)
                    .await
                {
                    log::error!(
                        "(run_loop) Fallo de ledger registrando intento fallido de {}: {:?}",
                        contact.phone,
                        e
                    );
                }

                let mut run = self.inner.run.write().unwrap();
                run.failed += 1;
                run.push_log(format!(
                    "[{}/{}] Fallo con {} ({}): {}",
                    idx, total, contact.name, contact.phone, error_text
                ));
            }

            {
                let mut run = self.inner.run.write().unwrap();
                run.current = idx as u64;
            }

            // Ritmo uniforme, haya salido bien o mal.
            pacer.pause().await;
        }

        {
            let mut run = self.inner.run.write().unwrap();
            run.finished_at = Some(Utc::now().to_rfc3339());
            if !stopped {
                let line = format!(
                    "Corrida completada: {} éxitos, {} fallos",
                    run.success, run.failed
                );
                run.push_log(line);
            }
            log::info!(
                "(run_loop) Corrida terminada: {}/{} procesados, {} éxitos, {} fallos{}",
                run.current,
                run.total,
                run.success,
                run.failed,
                if stopped { " (detenida)" } else { "" }
            );
        }

        self.inner.running.store(false, Ordering::SeqCst);
    }

    /// Pide la detención. No bloquea hasta que el loop realmente pare:
    /// el envío en vuelo no se interrumpe.
    pub fn stop(&self) -> bool {
        let was_running = self.inner.running.load(Ordering::SeqCst);
        let mut run = self.inner.run.write().unwrap();
        run.stop_requested = true;
        was_running
    }

    /// Snapshot del estado de la corrida (viva o última terminada).
    pub fn status(&self) -> DispatchStatusResponse {
        let run = self.inner.run.read().unwrap();
        DispatchStatusResponse {
            is_running: self.inner.running.load(Ordering::SeqCst),
            template_name: run.template_name.clone(),
            current_progress: run.current,
            success_count: run.success,
            failed_count: run.failed,
            total_count: run.total,
            started_at: run.started_at.clone(),
            finished_at: run.finished_at.clone(),
            logs: run.log.iter().cloned().collect(),
        }
    }

    /// Estadística previa al envío: cuántos recibirían la plantilla.
    pub async fn preview(
        &self,
        template_name: &str,
        limit: Option<i64>,
    ) -> Result<DispatchPreviewStats> {
        let recipients = self.inner.contacts.list_active_contacts().await?;
        let (selected, total_eligible) = self
            .inner
            .eligibility
            .resolve(template_name, &recipients, limit)
            .await?;

        Ok(DispatchPreviewStats {
            total_recipients: recipients.len(),
            already_sent: recipients.len() - total_eligible,
            will_send: selected.len(),
        })
    }
}
