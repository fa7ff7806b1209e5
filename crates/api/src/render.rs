//! Invoice renderer client
//!
//! PDF layout lives in an external renderer service; this client posts the
//! computed invoice document to it and returns the PDF bytes.

use admela_billing::InvoiceDocument;

#[derive(Clone)]
pub struct InvoiceRenderClient {
    http: reqwest::Client,
    base_url: String,
}

impl InvoiceRenderClient {
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Render one invoice document to PDF bytes.
    pub async fn render_pdf(&self, document: &InvoiceDocument) -> anyhow::Result<Vec<u8>> {
        let url = format!("{}/render", self.base_url);

        let response = self
            .http
            .post(&url)
            .json(document)
            .send()
            .await?
            .error_for_status()?;

        let bytes = response.bytes().await?;

        tracing::debug!(
            invoice_number = %document.invoice_number,
            pdf_bytes = bytes.len(),
            "Invoice rendered"
        );

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_document() -> InvoiceDocument {
        InvoiceDocument {
            title: "INVOICE",
            invoice_number: "INV-2026-0001".to_string(),
            buyer_name: "Asha Rao".to_string(),
            buyer_email: "asha@example.com".to_string(),
            buyer_gstin: None,
            plan_name: "Wallet Top-up".to_string(),
            hsn_sac: "998319".to_string(),
            amount_paise: 10_000,
            base_paise: 8475,
            gst_paise: 1525,
            cgst_paise: 762,
            sgst_paise: 763,
            igst_paise: 0,
            paid_at: None,
        }
    }

    #[tokio::test]
    async fn test_render_pdf_posts_document() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/render")
            .match_header("content-type", "application/json")
            .with_status(200)
            .with_header("content-type", "application/pdf")
            .with_body(b"%PDF-1.7 stub")
            .create_async()
            .await;

        let client = InvoiceRenderClient::new(server.url());
        let pdf = client.render_pdf(&sample_document()).await.unwrap();

        assert!(pdf.starts_with(b"%PDF"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_render_pdf_surfaces_renderer_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/render")
            .with_status(500)
            .create_async()
            .await;

        let client = InvoiceRenderClient::new(server.url());
        assert!(client.render_pdf(&sample_document()).await.is_err());
    }
}
