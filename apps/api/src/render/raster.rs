use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, info};

use crate::layout::pipeline::Pagination;
use crate::oracle::{CardRenderer, OracleError};
use crate::render::CardTemplate;

/// One rasterized image, named by its position in the output set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedImage {
    pub name: String,
    #[serde(skip)]
    pub bytes: Bytes,
}

/// Rasterizes a paginated document: the cover first (when the metadata asks
/// for one), then every card in order as `card_1.png`, `card_2.png`, ….
///
/// Calls are sequential. The first renderer error aborts the document.
pub async fn render_document(
    pagination: &Pagination,
    template: &CardTemplate,
    renderer: &dyn CardRenderer,
) -> Result<Vec<RenderedImage>, OracleError> {
    let (width, height) = template.frame();
    let total = pagination.cards.len();
    let mut images = Vec::with_capacity(total + 1);

    if let Some(cover) = template.cover(&pagination.metadata) {
        let bytes = renderer.rasterize(&cover, width, height).await?;
        images.push(RenderedImage {
            name: "cover.png".to_string(),
            bytes,
        });
    }

    for card in &pagination.cards {
        let markup = template.card(&card.content, &card.fence_repair, card.ordinal, total);
        let bytes = renderer.rasterize(&markup, width, height).await?;
        debug!(ordinal = card.ordinal, size = bytes.len(), "Rasterized card");
        images.push(RenderedImage {
            name: format!("card_{}.png", card.ordinal),
            bytes,
        });
    }

    info!(images = images.len(), "Rendered document");
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::document::Metadata;
    use crate::layout::cost_model::default_budget;
    use crate::models::{CardStatus, FenceRepair, PageCard};
    use crate::render::CardMarkup;

    /// Records every markup it sees and returns its index as the image.
    #[derive(Default)]
    struct RecordingRenderer {
        seen: Mutex<Vec<(String, u32, u32)>>,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl CardRenderer for RecordingRenderer {
        async fn rasterize(
            &self,
            markup: &CardMarkup,
            width: u32,
            height: u32,
        ) -> Result<Bytes, OracleError> {
            let mut seen = self.seen.lock().unwrap();
            if self.fail_on == Some(seen.len()) {
                return Err(OracleError::Unavailable("renderer down".to_string()));
            }
            seen.push((markup.html.clone(), width, height));
            Ok(Bytes::from(vec![seen.len() as u8]))
        }
    }

    fn page(ordinal: usize, content: &str) -> PageCard {
        PageCard {
            ordinal,
            segment: 0,
            content: content.to_string(),
            estimated_height: 100,
            measured_height: 220,
            status: CardStatus::Accepted,
            split_depth: 0,
            fence_repair: FenceRepair::default(),
        }
    }

    fn pagination(metadata: Metadata, contents: &[&str]) -> Pagination {
        Pagination {
            metadata,
            cards: contents
                .iter()
                .enumerate()
                .map(|(i, c)| page(i + 1, c))
                .collect(),
            overflow_count: 0,
        }
    }

    #[tokio::test]
    async fn test_renders_cards_in_order_with_page_labels() {
        let template = CardTemplate::new(&default_budget());
        let renderer = RecordingRenderer::default();
        let images = render_document(
            &pagination(Metadata::default(), &["first", "second"]),
            &template,
            &renderer,
        )
        .await
        .unwrap();

        let names: Vec<&str> = images.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["card_1.png", "card_2.png"]);

        let seen = renderer.seen.lock().unwrap();
        assert!(seen[0].0.contains("first") && seen[0].0.contains(">1/2<"));
        assert!(seen[1].0.contains("second") && seen[1].0.contains(">2/2<"));
        assert!(seen.iter().all(|(_, w, h)| (*w, *h) == (1080, 1440)));
    }

    #[tokio::test]
    async fn test_cover_comes_first_when_titled() {
        let template = CardTemplate::new(&default_budget());
        let renderer = RecordingRenderer::default();
        let metadata = Metadata {
            title: Some("Title".to_string()),
            ..Metadata::default()
        };
        let images = render_document(&pagination(metadata, &["only"]), &template, &renderer)
            .await
            .unwrap();

        assert_eq!(images[0].name, "cover.png");
        assert_eq!(images[1].name, "card_1.png");
        assert_eq!(&images[1].bytes[..], &[2]);
    }

    #[tokio::test]
    async fn test_renderer_error_aborts() {
        let template = CardTemplate::new(&default_budget());
        let renderer = RecordingRenderer {
            fail_on: Some(1),
            ..RecordingRenderer::default()
        };
        let err = render_document(
            &pagination(Metadata::default(), &["a", "b", "c"]),
            &template,
            &renderer,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, OracleError::Unavailable(_)));
    }
}
