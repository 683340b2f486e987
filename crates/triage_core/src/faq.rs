//! Canned answers for questions about the classifier.
//!
//! Matching is a case-insensitive substring test over an ordered table. The
//! first trigger in table order that occurs in the message wins, so a message
//! naming several topics always gets the same answer.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaqEntry {
    pub trigger: &'static str,
    pub response: &'static str,
}

pub const GREETING: &str = "Hello! Ask me about the X-ray classification system: how it works, \
     accuracy, supported formats, confidence scores, uploading images or reports.";

pub const FALLBACK_RESPONSE: &str = "I can answer questions about the X-ray classification \
     system. Try asking how it works, about accuracy, supported formats, confidence scores, or \
     how to upload images and download reports.";

pub const FAQ_TABLE: &[FaqEntry] = &[
    FaqEntry {
        trigger: "how does it work",
        response: "A convolutional neural network trained on chest X-ray images classifies each \
                   image as COVID-19 positive or normal and reports a confidence score with \
                   every prediction.",
    },
    FaqEntry {
        trigger: "accuracy",
        response: "The model was trained on a COVID-19 radiography dataset and performs well on \
                   held-out data. It is a screening aid and not a replacement for a diagnosis \
                   by a medical professional.",
    },
    FaqEntry {
        trigger: "supported formats",
        response: "Common image formats such as JPEG and PNG are accepted. Each image must be \
                   under 10MB; other files are excluded from the batch.",
    },
    FaqEntry {
        trigger: "confidence score",
        response: "The confidence score is how certain the model is about its prediction, from \
                   0% to 100%. Higher scores mean greater certainty.",
    },
    FaqEntry {
        trigger: "covid positive",
        response: "A positive prediction means the X-ray shows patterns consistent with \
                   COVID-19. Please consult a medical professional for diagnosis and treatment.",
    },
    FaqEntry {
        trigger: "normal result",
        response: "A normal prediction means the model found no typical COVID-19 indicators. It \
                   does not rule out other conditions.",
    },
    FaqEntry {
        trigger: "upload",
        response: "Pass one or more chest X-ray images to the classify command. All images are \
                   processed as one batch.",
    },
    FaqEntry {
        trigger: "report",
        response: "After classification a CSV report is written with the filename, prediction, \
                   confidence score and status of every processed image.",
    },
    FaqEntry {
        trigger: "training",
        response: "The model is a CNN with convolutional, max pooling and dense layers, trained \
                   with the Adam optimizer over multiple epochs.",
    },
    FaqEntry {
        trigger: "help",
        response: "I can help with: how the system works, accuracy, supported formats, \
                   confidence scores, uploading images, downloading reports and understanding \
                   results. What would you like to know?",
    },
    FaqEntry {
        trigger: "thank",
        response: "You're welcome! Ask again any time you have a question about the \
                   classification system.",
    },
];

/// Answers `message` from [`FAQ_TABLE`]. Returns `None` for blank input.
pub fn respond(message: &str) -> Option<&'static str> {
    respond_with(FAQ_TABLE, FALLBACK_RESPONSE, message)
}

pub fn respond_with<'a>(table: &'a [FaqEntry], fallback: &'a str, message: &str) -> Option<&'a str> {
    if message.trim().is_empty() {
        return None;
    }
    let lowered = message.to_lowercase();
    let response = table
        .iter()
        .find(|entry| lowered.contains(entry.trigger))
        .map_or(fallback, |entry| entry.response);
    Some(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_message_gets_no_answer() {
        assert_eq!(respond("   \n"), None);
    }

    #[test]
    fn unknown_question_falls_back() {
        assert_eq!(respond("what is the weather"), Some(FALLBACK_RESPONSE));
    }

    #[test]
    fn table_order_decides_between_triggers() {
        // "report" comes before "help" in the table.
        let answer = respond("Help me with the REPORT").unwrap();
        assert!(answer.contains("CSV report"));
    }

    #[test]
    fn custom_table_is_respected() {
        let table = [
            FaqEntry {
                trigger: "b",
                response: "second",
            },
            FaqEntry {
                trigger: "a",
                response: "first",
            },
        ];
        assert_eq!(respond_with(&table, "none", "a b"), Some("second"));
        assert_eq!(respond_with(&table, "none", "xyz"), Some("none"));
    }
}
