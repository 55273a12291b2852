//! services/pacer.rs
//! Ritmo del loop de envío. El cálculo del intervalo vive acá, separado
//! del loop, para poder testearlo sin reloj de pared; la espera usa
//! tokio::time, así los tests con reloj pausado corren al instante.

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    interval: Duration,
}

impl Pacer {
    /// Intervalo = 60 / messages_per_minute segundos. Un ritmo de 0 se
    /// trata como 1 para no dividir por cero.
    pub fn from_rate(messages_per_minute: u32) -> Self {
        let mpm = messages_per_minute.max(1);
        Pacer {
            interval: Duration::from_secs_f64(60.0 / f64::from(mpm)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Espera un intervalo. Se aplica después de cada intento, haya
    /// salido bien o mal.
    pub async fn pause(&self) {
        tokio::time::sleep(self.interval).await;
    }
}
