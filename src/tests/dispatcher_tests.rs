//! tests/dispatcher_tests.rs
//! Pruebas del loop de envío: idempotencia entre corridas, aislamiento de
//! fallos, cancelación cooperativa, guard de busy y ritmo.

use std::sync::Arc;
use std::time::Duration;

use crate::models::dispatch_model::StartDispatchRequest;
use crate::services::dispatcher_service::StartDispatchError;
use crate::services::pacer::Pacer;
use crate::tests::support::{
    build_dispatcher, seed_contacts, test_pool, wait_until_idle, BlockingSender, StubSender,
};

const TEMPLATE: &str = "promo_enero";

fn start_req(template: &str, limit: Option<i64>, mpm: u32) -> StartDispatchRequest {
    StartDispatchRequest {
        template_name: template.to_string(),
        limit,
        messages_per_minute: Some(mpm),
        header_image_id: None,
        language_code: None,
    }
}

#[tokio::test]
async fn test_corridas_repetidas_son_idempotentes() {
    let pool = test_pool().await;
    let stub = StubSender::new();
    let (dispatcher, contacts, ledger) = build_dispatcher(&pool, stub.clone());
    seed_contacts(&contacts, 3).await;

    let resp = dispatcher
        .start(start_req(TEMPLATE, None, 60_000))
        .await
        .expect("primera corrida");
    assert_eq!(resp.selected, 3);
    assert_eq!(resp.total_eligible, 3);

    wait_until_idle(&dispatcher).await;

    let status = dispatcher.status();
    assert_eq!(status.success_count, 3);
    assert_eq!(status.failed_count, 0);
    assert_eq!(status.current_progress, 3);
    assert_eq!(ledger.fulfilled_phones(TEMPLATE).await.expect("ledger").len(), 3);

    // Segunda corrida: el resolver excluye a todos; nunca se arranca.
    let err = dispatcher
        .start(start_req(TEMPLATE, None, 60_000))
        .await
        .expect_err("no debería haber elegibles");
    assert!(matches!(err, StartDispatchError::NoEligibleRecipients));
    assert_eq!(stub.calls().len(), 3, "nadie recibió el mensaje dos veces");
}

#[tokio::test]
async fn test_aislamiento_de_fallos_por_destinatario() {
    let pool = test_pool().await;
    let stub = StubSender::new();
    let (dispatcher, contacts, ledger) = build_dispatcher(&pool, stub.clone());
    let phones = seed_contacts(&contacts, 5).await;

    // Falla el tercero; los que siguen deben recibir igual.
    stub.fail_phone(&phones[2]);

    dispatcher
        .start(start_req(TEMPLATE, None, 60_000))
        .await
        .expect("corrida");
    wait_until_idle(&dispatcher).await;

    let status = dispatcher.status();
    assert_eq!(status.success_count, 4, "4 y 5 deben recibir su intento");
    assert_eq!(status.failed_count, 1);
    assert_eq!(stub.calls().len(), 5);

    // El fallido sigue elegible: la corrida siguiente lo reintenta sola.
    stub.clear_failures();
    let resp = dispatcher
        .start(start_req(TEMPLATE, None, 60_000))
        .await
        .expect("reintento");
    assert_eq!(resp.selected, 1);
    wait_until_idle(&dispatcher).await;

    assert_eq!(ledger.fulfilled_phones(TEMPLATE).await.expect("ledger").len(), 5);
}

#[tokio::test]
async fn test_cancelacion_cooperativa() {
    let pool = test_pool().await;
    let stub = StubSender::with_stop_after(4);
    let (dispatcher, contacts, ledger) = build_dispatcher(&pool, stub.clone());
    stub.attach_dispatcher(dispatcher.clone());
    seed_contacts(&contacts, 10).await;

    dispatcher
        .start(start_req(TEMPLATE, None, 60_000))
        .await
        .expect("corrida");
    wait_until_idle(&dispatcher).await;

    let status = dispatcher.status();
    assert_eq!(status.current_progress, 4, "se detuvo tras 4 envíos");
    assert_eq!(status.total_count, 10);
    assert_eq!(status.success_count, 4);

    // El log termina con la línea de detención
    let last_line = status.logs.last().expect("log no vacío");
    assert!(
        last_line.contains("Detenido"),
        "la última línea debe ser la de detención: {last_line}"
    );

    // Exactamente 4 filas en el ledger; el resto sigue elegible
    let (_, total) = ledger.recent_messages(Some(TEMPLATE), 100).await.expect("logs");
    assert_eq!(total, 4);
}

#[tokio::test]
async fn test_start_con_corrida_viva_responde_busy() {
    let pool = test_pool().await;
    let (dispatcher, contacts, _) = build_dispatcher(&pool, Arc::new(BlockingSender));
    seed_contacts(&contacts, 2).await;

    dispatcher
        .start(start_req(TEMPLATE, None, 60))
        .await
        .expect("primera corrida");
    assert!(dispatcher.status().is_running);

    // No se encola: rechazo explícito
    let err = dispatcher
        .start(start_req(TEMPLATE, None, 60))
        .await
        .expect_err("debe rechazar");
    assert!(matches!(err, StartDispatchError::Busy));

    assert!(dispatcher.stop(), "stop reconoce la corrida viva");
}

#[tokio::test]
async fn test_template_vacia_rechazada() {
    let pool = test_pool().await;
    let (dispatcher, contacts, _) = build_dispatcher(&pool, StubSender::new());
    seed_contacts(&contacts, 1).await;

    let err = dispatcher
        .start(start_req("   ", None, 60))
        .await
        .expect_err("template vacía");
    assert!(matches!(err, StartDispatchError::MissingTemplate));
}

#[tokio::test]
async fn test_limite_y_preview() {
    let pool = test_pool().await;
    let stub = StubSender::new();
    let (dispatcher, contacts, ledger) = build_dispatcher(&pool, stub.clone());
    let phones = seed_contacts(&contacts, 10).await;

    let preview = dispatcher.preview(TEMPLATE, Some(3)).await.expect("preview");
    assert_eq!(preview.total_recipients, 10);
    assert_eq!(preview.already_sent, 0);
    assert_eq!(preview.will_send, 3);

    let resp = dispatcher
        .start(start_req(TEMPLATE, Some(3), 60_000))
        .await
        .expect("corrida con limit");
    assert_eq!(resp.selected, 3);
    assert_eq!(resp.total_eligible, 10, "el total elegible ignora el limit");
    wait_until_idle(&dispatcher).await;

    // Recibieron los primeros 3 en orden de alta
    let fulfilled = ledger.fulfilled_phones(TEMPLATE).await.expect("ledger");
    for phone in &phones[..3] {
        assert!(fulfilled.contains(phone), "falta {phone}");
    }
    assert_eq!(fulfilled.len(), 3);

    let preview = dispatcher.preview(TEMPLATE, None).await.expect("preview");
    assert_eq!(preview.already_sent, 3);
    assert_eq!(preview.will_send, 7);
}

#[test]
fn test_intervalo_del_pacer() {
    // 60 por minuto => 1 segundo entre envíos
    assert_eq!(Pacer::from_rate(60).interval(), Duration::from_secs(1));
    assert_eq!(Pacer::from_rate(120).interval(), Duration::from_millis(500));
    assert_eq!(Pacer::from_rate(30).interval(), Duration::from_secs(2));
    // 0 no divide por cero: se trata como 1 por minuto
    assert_eq!(Pacer::from_rate(0).interval(), Duration::from_secs(60));
}

#[tokio::test]
async fn test_ritmo_entre_envios() {
    let pool = test_pool().await;
    let stub = StubSender::new();
    let (dispatcher, contacts, _) = build_dispatcher(&pool, stub.clone());
    seed_contacts(&contacts, 3).await;

    // El reloj se pausa recién acá: el pool y el seed necesitan los
    // timeouts reales de sqlx.
    tokio::time::pause();

    let inicio = tokio::time::Instant::now();
    dispatcher
        .start(start_req(TEMPLATE, None, 60))
        .await
        .expect("corrida");
    wait_until_idle(&dispatcher).await;

    // Con 60 por minuto, 3 intentos imponen al menos 3 pausas de 1s
    // (reloj virtual: el test corre al instante).
    assert!(
        inicio.elapsed() >= Duration::from_secs(3),
        "los envíos consecutivos deben ir espaciados: {:?}",
        inicio.elapsed()
    );
    assert_eq!(dispatcher.status().success_count, 3);
}
