use chrono::{DateTime, Utc};
use printpdf::{BuiltinFont, Mm, PdfDocument};
use std::fmt::Write;

use crate::reservation::Reservation;
use crate::trip::Trip;
use crate::{CoreError, CoreResult};

// A4, in millimetres
const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const LINE_HEIGHT: f32 = 5.5;
const FONT_SIZE: f32 = 10.0;

/// Plain-text reservation document handed to customers.
pub struct ReservationSummary<'a> {
    trip: &'a Trip,
    reservation: &'a Reservation,
    generated_at: DateTime<Utc>,
}

impl<'a> ReservationSummary<'a> {
    pub fn new(trip: &'a Trip, reservation: &'a Reservation) -> Self {
        Self {
            trip,
            reservation,
            generated_at: Utc::now(),
        }
    }

    pub fn render(&self) -> String {
        let trip = self.trip;
        let r = self.reservation;
        let mut out = String::new();

        // Writing into a String cannot fail
        let _ = writeln!(out, "RESERVATION DETAILS");
        let _ = writeln!(out, "{}", "=".repeat(40));

        section(&mut out, "Trip Information");
        let _ = writeln!(out, "Trip: {}", trip.title);
        let _ = writeln!(out, "Date: {}", trip.trip_date.format("%Y-%m-%d"));
        let _ = writeln!(out, "Duration: {} days", trip.days);

        section(&mut out, "Customer Information");
        let _ = writeln!(out, "Name: {} {}", r.contact.name, r.contact.surname);
        let _ = writeln!(out, "Email: {}", r.contact.email.expose());
        let _ = writeln!(out, "Phone: {}", r.contact.phone.expose());

        section(&mut out, "Reservation");
        let _ = writeln!(out, "Reservation ID: {}", r.id);
        let _ = writeln!(out, "Number of People: {}", r.participant_count);
        let _ = writeln!(out, "Total Price: {}", format_cents(r.total_price_cents));
        let _ = writeln!(out, "Status: {}", if r.active { "Active" } else { "Cancelled" });

        section(&mut out, "Participants");
        let width = r
            .participants
            .iter()
            .map(|p| p.name.chars().count())
            .max()
            .unwrap_or(0)
            .max("Name".len());
        let _ = writeln!(out, "{:<width$}  Surname", "Name", width = width);
        for p in &r.participants {
            let _ = writeln!(out, "{:<width$}  {}", p.name, p.surname, width = width);
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Generated on: {}", self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
        out
    }
}

impl ReservationSummary<'_> {
    /// The same document laid out on A4 pages in a monospaced font, so the
    /// participant table keeps its columns.
    pub fn render_pdf(&self) -> CoreResult<Vec<u8>> {
        let text = self.render();
        let (doc, page, layer) = PdfDocument::new(
            format!("Reservation {}", self.reservation.id),
            Mm(PAGE_WIDTH),
            Mm(PAGE_HEIGHT),
            "Summary".to_string(),
        );
        let font = doc.add_builtin_font(BuiltinFont::Courier).map_err(pdf_error)?;
        let bold = doc.add_builtin_font(BuiltinFont::CourierBold).map_err(pdf_error)?;

        let mut canvas = doc.get_page(page).get_layer(layer);
        let mut y = PAGE_HEIGHT - MARGIN;
        for (i, line) in text.lines().enumerate() {
            if y < MARGIN {
                let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Summary".to_string());
                canvas = doc.get_page(page).get_layer(layer);
                y = PAGE_HEIGHT - MARGIN;
            }
            let face = if i == 0 { &bold } else { &font };
            canvas.use_text(line, FONT_SIZE, Mm(MARGIN), Mm(y), face);
            y -= LINE_HEIGHT;
        }

        doc.save_to_bytes().map_err(pdf_error)
    }
}

fn pdf_error(err: printpdf::Error) -> CoreError {
    CoreError::Internal(format!("pdf rendering failed: {}", err))
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", title);
    let _ = writeln!(out, "{}", "-".repeat(title.len()));
}

/// 123456 -> "1234.56"
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reservation::tests::booking;
    use crate::trip::tests::new_trip;

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(120_000), "1200.00");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(-250), "-2.50");
    }

    #[test]
    fn test_render_sections() {
        let trip = Trip::create(new_trip("Romantic Paris", 20)).unwrap();
        let mut reservation = Reservation::open(&trip, "u-1", booking(trip.id, 2)).unwrap();

        let text = ReservationSummary::new(&trip, &reservation).render();
        assert!(text.contains("Trip: Romantic Paris"));
        assert!(text.contains("Date: 2027-05-14"));
        assert!(text.contains("Number of People: 2"));
        assert!(text.contains("Total Price: 2400.00"));
        assert!(text.contains("Status: Active"));
        assert!(text.contains("Guest1  Nowak"));

        reservation.mark_cancelled().unwrap();
        let text = ReservationSummary::new(&trip, &reservation).render();
        assert!(text.contains("Status: Cancelled"));
    }

    #[test]
    fn test_pdf_spans_pages_for_large_groups() {
        let trip = Trip::create(new_trip("Historic Rome", 200)).unwrap();
        let small = Reservation::open(&trip, "u-1", booking(trip.id, 2)).unwrap();
        let large = Reservation::open(&trip, "u-1", booking(trip.id, 120)).unwrap();

        let one_page = ReservationSummary::new(&trip, &small).render_pdf().unwrap();
        let many_pages = ReservationSummary::new(&trip, &large).render_pdf().unwrap();

        assert!(one_page.starts_with(b"%PDF"));
        assert!(many_pages.starts_with(b"%PDF"));
        assert!(many_pages.len() > one_page.len());
    }
}
