//! # Notification Composer
//!
//! Renders service-desk events into the chat messages customers receive.
//!
//! ## Message Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SERVICE CREATED                     SERVICE STATUS CHANGED            │
//! │  ───────────────                     ──────────────────────            │
//! │  greeting                            greeting                          │
//! │  number / received / status          number / device                   │
//! │  device (brand, model, serial?)      headline + next steps             │
//! │  problem (symptoms?, notes?)         diagnosis?                        │
//! │  estimated cost or placeholder       solution?                         │
//! │  parts + subtotal?                   actual cost? (only if > 0)        │
//! │  contact block                       completed at? (completed only)    │
//! │  status link                         status link                       │
//! │                                      sign-off                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sections marked `?` disappear entirely when their data is missing. The
//! section order is fixed; message history in the shop's chat depends on it.
//!
//! Everything here is pure: the same notice and composer always produce the
//! same text.

use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::types::{NotificationEvent, ServiceNotice, ServiceStatus};

/// Default public page where customers look up a ticket.
pub const DEFAULT_STATUS_BASE_URL: &str = "https://reparo.id/cek-servis";

/// Western Indonesia Time (WIB), UTC+7.
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 7;

const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Placeholder shown when no quote has been given yet.
const COST_PENDING: &str = "Menunggu pengecekan teknisi";

// =============================================================================
// Status Phrases
// =============================================================================

/// Label shown in the "service created" header.
///
/// Statuses outside the intake set fall back to the pending label.
pub fn status_label(status: &ServiceStatus) -> &'static str {
    match status {
        ServiceStatus::Pending => "Menunggu Pengecekan",
        ServiceStatus::Checking => "Sedang Dicek",
        ServiceStatus::InProgress => "Sedang Dikerjakan",
        ServiceStatus::WaitingParts => "Menunggu Suku Cadang",
        ServiceStatus::WaitingPayment => "Menunggu Pembayaran",
        ServiceStatus::Completed => "Selesai",
        ServiceStatus::Delivered => "Sudah Diambil",
        ServiceStatus::Cancelled => "Dibatalkan",
        _ => "Menunggu Pengecekan",
    }
}

/// Headline and next-steps sentence for a status change.
pub fn status_update_phrases(status: &ServiceStatus) -> (&'static str, &'static str) {
    match status {
        ServiceStatus::Checking => (
            "Sedang Dicek",
            "Teknisi kami sedang memeriksa perangkat Anda. Hasil diagnosa akan kami kabarkan secepatnya.",
        ),
        ServiceStatus::InProgress => (
            "Sedang Dikerjakan",
            "Perangkat Anda sedang dalam proses perbaikan oleh teknisi kami.",
        ),
        ServiceStatus::Completed => (
            "Selesai",
            "Perangkat Anda sudah selesai diperbaiki dan siap diambil. Jangan lupa membawa nota servis.",
        ),
        ServiceStatus::Cancelled => (
            "Dibatalkan",
            "Servis perangkat Anda dibatalkan. Silakan hubungi kami untuk informasi lebih lanjut.",
        ),
        ServiceStatus::WaitingParts => (
            "Menunggu Suku Cadang",
            "Kami sedang menunggu suku cadang yang dibutuhkan. Kami akan mengabari begitu suku cadang tersedia.",
        ),
        ServiceStatus::WaitingPayment => (
            "Menunggu Pembayaran",
            "Silakan selesaikan pembayaran agar perangkat dapat segera diambil.",
        ),
        ServiceStatus::WaitingConfirmation => (
            "Menunggu Konfirmasi",
            "Mohon konfirmasi persetujuan biaya perbaikan agar kami dapat melanjutkan servis.",
        ),
        ServiceStatus::Testing => (
            "Tahap Pengujian",
            "Perangkat Anda sedang dalam tahap pengujian akhir untuk memastikan semuanya berfungsi normal.",
        ),
        _ => (
            "Diperbarui",
            "Status servis Anda telah diperbarui. Hubungi kami untuk detail lebih lanjut.",
        ),
    }
}

// =============================================================================
// Composer
// =============================================================================

/// Renders notification events into message text.
///
/// ## Example
/// ```rust,ignore
/// let composer = NotificationComposer::new("https://toko.example/cek");
/// let text = composer.render(&event);
/// dispatcher.send(event.recipient_phone(), &text).await;
/// ```
#[derive(Debug, Clone)]
pub struct NotificationComposer {
    status_base_url: String,
    utc_offset: FixedOffset,
}

impl Default for NotificationComposer {
    fn default() -> Self {
        NotificationComposer::new(DEFAULT_STATUS_BASE_URL)
    }
}

impl NotificationComposer {
    /// Creates a composer linking to `status_base_url`, rendering times in WIB.
    pub fn new(status_base_url: impl Into<String>) -> Self {
        NotificationComposer {
            status_base_url: status_base_url.into(),
            utc_offset: offset_from_hours(DEFAULT_UTC_OFFSET_HOURS),
        }
    }

    /// Renders timestamps at a different UTC offset.
    ///
    /// Offsets outside ±23h are ignored and UTC is used instead.
    pub fn with_utc_offset_hours(mut self, hours: i32) -> Self {
        self.utc_offset = offset_from_hours(hours);
        self
    }

    /// Returns the status page for a service number.
    pub fn status_url(&self, service_number: &str) -> String {
        format!(
            "{}/{}",
            self.status_base_url.trim_end_matches('/'),
            service_number.trim()
        )
    }

    /// Renders whichever message the event calls for.
    pub fn render(&self, event: &NotificationEvent) -> String {
        match event {
            NotificationEvent::ServiceCreated(notice) => self.render_service_created(notice),
            NotificationEvent::ServiceStatusChanged(notice) => {
                self.render_service_status_changed(notice)
            }
        }
    }

    /// Renders the intake confirmation sent when a ticket is opened.
    pub fn render_service_created(&self, notice: &ServiceNotice) -> String {
        let ticket = &notice.ticket;
        let mut sections: Vec<String> = Vec::with_capacity(10);

        sections.push(format!(
            "Halo *{}*,\n\nTerima kasih telah mempercayakan perangkat Anda kepada *{}*. Berikut detail servis Anda:",
            notice.customer.name.trim(),
            notice.store.name.trim()
        ));

        sections.push(format!(
            "*No. Servis:* {}\n*Tanggal Masuk:* {}\n*Status:* {}",
            ticket.service_number,
            self.format_timestamp(&ticket.received_at),
            status_label(&ticket.status)
        ));

        let mut device = vec![
            "*Perangkat*".to_string(),
            format!("Jenis: {}", ticket.device_type.trim()),
        ];
        if let Some(brand) = present(&ticket.brand) {
            device.push(format!("Merek: {}", brand));
        }
        if let Some(model) = present(&ticket.model) {
            device.push(format!("Model: {}", model));
        }
        if let Some(serial) = present(&ticket.serial_number) {
            device.push(format!("No. Seri: {}", serial));
        }
        sections.push(device.join("\n"));

        let mut problem = vec![
            "*Keluhan*".to_string(),
            ticket.problem_description.trim().to_string(),
        ];
        if let Some(symptoms) = present(&ticket.symptoms) {
            problem.push(format!("Gejala: {}", symptoms));
        }
        if let Some(notes) = present(&ticket.technician_notes) {
            problem.push(format!("Catatan Teknisi: {}", notes));
        }
        sections.push(problem.join("\n"));

        let estimate = match ticket.estimated_cost {
            Some(cost) => cost.to_string(),
            None => COST_PENDING.to_string(),
        };
        sections.push(format!("*Estimasi Biaya:* {}", estimate));

        if !ticket.parts.is_empty() {
            let mut parts = vec!["*Suku Cadang*".to_string()];
            parts.extend(
                ticket
                    .parts
                    .iter()
                    .map(|part| format!("• {} x{} @ {}", part.name.trim(), part.quantity, part.unit_price)),
            );
            parts.push(format!("*Subtotal Suku Cadang:* {}", ticket.parts_subtotal()));
            sections.push(parts.join("\n"));
        }

        let mut contact = vec![
            "*Hubungi Kami*".to_string(),
            format!("{} - {}", notice.store.name.trim(), notice.store.phone.trim()),
        ];
        if let Some(address) = present(&notice.store.address) {
            contact.push(address.to_string());
        }
        sections.push(contact.join("\n"));

        sections.push(self.status_link(&ticket.service_number));

        sections.join("\n\n")
    }

    /// Renders the update sent when a ticket changes status.
    pub fn render_service_status_changed(&self, notice: &ServiceNotice) -> String {
        let ticket = &notice.ticket;
        let (headline, next_steps) = status_update_phrases(&ticket.status);
        let mut sections: Vec<String> = Vec::with_capacity(9);

        sections.push(format!(
            "Halo *{}*,\n\nAda kabar terbaru untuk servis Anda di *{}*.",
            notice.customer.name.trim(),
            notice.store.name.trim()
        ));

        sections.push(format!(
            "*No. Servis:* {}\n*Perangkat:* {}",
            ticket.service_number,
            ticket.device_summary()
        ));

        sections.push(format!("*Status: {}*\n{}", headline, next_steps));

        if let Some(diagnosis) = present(&ticket.diagnosis) {
            sections.push(format!("*Diagnosa:*\n{}", diagnosis));
        }

        if let Some(solution) = present(&ticket.solution) {
            sections.push(format!("*Solusi:*\n{}", solution));
        }

        if let Some(cost) = ticket.actual_cost.filter(|cost| cost.is_positive()) {
            sections.push(format!("*Biaya Akhir:* {}", cost));
        }

        if ticket.status == ServiceStatus::Completed {
            if let Some(completed_at) = &ticket.completed_at {
                sections.push(format!(
                    "*Selesai pada:* {}",
                    self.format_timestamp(completed_at)
                ));
            }
        }

        sections.push(self.status_link(&ticket.service_number));

        sections.push(format!("Terima kasih,\n*{}*", notice.store.name.trim()));

        sections.join("\n\n")
    }

    fn status_link(&self, service_number: &str) -> String {
        format!(
            "Cek status servis Anda kapan saja di:\n{}",
            self.status_url(service_number)
        )
    }

    fn format_timestamp(&self, at: &DateTime<Utc>) -> String {
        at.with_timezone(&self.utc_offset)
            .format(TIMESTAMP_FORMAT)
            .to_string()
    }
}

/// Treats blank strings the same as missing ones.
fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn offset_from_hours(hours: i32) -> FixedOffset {
    hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix())
}

// =============================================================================
// Unit Tests
// =============================================================================
