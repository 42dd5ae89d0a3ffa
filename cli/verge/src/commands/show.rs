use anyhow::{Context, Result, bail};
use bpaf::Bpaf;
use tracing::{debug, instrument};
use verge_catalog::{Client, ClientTrait, ItemError, ItemId};

use crate::utils::search::DisplayItemDetails;

// Show the details of a single catalog item
#[derive(Debug, Bpaf, Clone)]
pub struct Show {
    /// Print the item as JSON
    #[bpaf(long)]
    pub json: bool,

    /// Id of the item, as printed by 'verge search'
    #[bpaf(positional("item-id"))]
    pub item_id: String,
}

impl Show {
    #[instrument(name = "show", fields(item_id = self.item_id), skip_all)]
    pub async fn handle(self, client: Client) -> Result<()> {
        let id = ItemId::from(self.item_id);
        let item = match client.get_item_by_id(&id).await {
            Ok(item) => item,
            Err(ItemError::NotFound(id)) => bail!("No item matched this id: '{id}'"),
            Err(err @ ItemError::Remote(_)) => {
                return Err(err).context("Could not look up the item");
            },
        };
        debug!(?item, "found item");

        if self.json {
            println!("{}", serde_json::to_string(&item)?);
        } else {
            println!("{}", DisplayItemDetails(&item));
        }
        Ok(())
    }
}
