//! Fire-and-forget delivery-status reports to the order side.

use std::sync::Arc;

use common::AggregateId;
use domain::DeliveryStatus;
use tokio::sync::mpsc;

use crate::services::{DeliveryReport, OrderGateway};
use crate::settings::FulfillmentSettings;

/// Queues delivery outcomes and reports them from a background task.
///
/// `notify` never waits on the order side. A full queue drops the report and
/// a failed report is only logged; neither reaches the shipment caller.
#[derive(Clone)]
pub struct DeliveryNotifier {
    tx: Option<mpsc::Sender<DeliveryReport>>,
}

impl DeliveryNotifier {
    /// Starts the worker. Must be called inside a tokio runtime.
    ///
    /// With webhooks disabled in `settings`, no worker is started and every
    /// report is discarded.
    pub fn spawn(gateway: Arc<dyn OrderGateway>, settings: &FulfillmentSettings) -> Self {
        if !settings.delivery_webhook_enabled {
            return Self::disabled();
        }
        let (tx, rx) = mpsc::channel(settings.notifier_queue_capacity.max(1));
        tokio::spawn(run_worker(gateway, rx));
        Self { tx: Some(tx) }
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn notify(&self, order_id: AggregateId, status: DeliveryStatus, note: Option<String>) {
        let Some(tx) = &self.tx else {
            return;
        };
        let report = DeliveryReport {
            order_id,
            status,
            note,
        };
        match tx.try_send(report) {
            Ok(()) => metrics::counter!("delivery_notifications_queued_total").increment(1),
            Err(mpsc::error::TrySendError::Full(report)) => {
                metrics::counter!("delivery_notifications_dropped_total").increment(1);
                tracing::warn!(order_id = %report.order_id, status = report.status.as_str(), "notification queue full, report dropped");
            }
            Err(mpsc::error::TrySendError::Closed(report)) => {
                metrics::counter!("delivery_notifications_dropped_total").increment(1);
                tracing::error!(order_id = %report.order_id, "notifier stopped, report dropped");
            }
        }
    }
}

async fn run_worker(gateway: Arc<dyn OrderGateway>, mut rx: mpsc::Receiver<DeliveryReport>) {
    tracing::info!("delivery notifier started");

    while let Some(report) = rx.recv().await {
        let DeliveryReport {
            order_id,
            status,
            note,
        } = report;
        match gateway.report_delivery_status(order_id, status, note).await {
            Ok(()) => {
                tracing::debug!(%order_id, status = status.as_str(), "delivery status reported");
            }
            Err(e) => {
                metrics::counter!("delivery_notifications_failed_total").increment(1);
                tracing::warn!(%order_id, status = status.as_str(), error = %e, "delivery status report failed");
            }
        }
    }

    tracing::info!("delivery notifier stopped");
}
