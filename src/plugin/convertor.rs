use std::sync::Arc;

use crate::logic::CreateContext;

/// Helper for converting instances created by legacy creators.
///
/// A convertor finds legacy instances during reset and reports them with a
/// convertor item. Conversion itself is triggered by the artist.
pub trait SubsetConvertor: Send + Sync {
    fn identifier(&self) -> &str;

    /// Look for legacy instances. Call [`SubsetConvertor::add_convertor_item`]
    /// when any were found.
    fn find_instances(&self, ctx: &mut CreateContext) -> anyhow::Result<()>;

    /// Convert legacy instances to the current instance schema.
    fn convert(&self, ctx: &mut CreateContext) -> anyhow::Result<()>;

    fn add_convertor_item(&self, ctx: &mut CreateContext, label: &str) {
        ctx.add_convertor_item(self.identifier(), label);
    }

    fn remove_convertor_item(&self, ctx: &mut CreateContext) {
        ctx.remove_convertor_item(self.identifier());
    }
}

pub type ConvertorRef = Arc<dyn SubsetConvertor>;
