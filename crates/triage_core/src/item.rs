use bytes::Bytes;

pub type ItemId = u64;

/// One image submitted for classification.
///
/// The payload is reference counted, so handing an item to the controller
/// moves ownership of the buffer without copying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputItem {
    pub id: ItemId,
    pub name: String,
    pub payload: Bytes,
}

impl InputItem {
    pub fn new(id: ItemId, name: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            id,
            name: name.into(),
            payload: payload.into(),
        }
    }

    /// Builds a batch whose ids follow submission order, starting at 1.
    pub fn numbered<I, N, P>(files: I) -> Vec<Self>
    where
        I: IntoIterator<Item = (N, P)>,
        N: Into<String>,
        P: Into<Bytes>,
    {
        files
            .into_iter()
            .zip(1..)
            .map(|((name, payload), id)| Self::new(id, name, payload))
            .collect()
    }

    pub fn summary(&self) -> ItemSummary {
        ItemSummary {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

/// Payload-free view of an item, kept in the job state and the report.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemSummary {
    pub id: ItemId,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::InputItem;

    #[test]
    fn numbered_assigns_ids_in_order() {
        let items = InputItem::numbered(vec![("b.png", vec![1u8]), ("a.png", vec![2u8])]);
        let ids: Vec<_> = items.iter().map(|i| (i.id, i.name.as_str())).collect();
        assert_eq!(ids, vec![(1, "b.png"), (2, "a.png")]);
    }
}
