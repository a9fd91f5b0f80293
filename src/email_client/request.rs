use serde::Serialize;

/// Wire format of the mail provider's send endpoint: a batch envelope
/// holding exactly one message per delivery attempt.
#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmailRequest<'a> {
    pub messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Message<'a> {
    pub from: Address<'a>,
    pub to: Vec<Address<'a>>,
    pub subject: &'a str,
    #[serde(rename = "TextPart")]
    pub text_part: &'a str,
    #[serde(rename = "HTMLPart")]
    pub html_part: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Address<'a> {
    pub email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
}

impl<'a> EmailRequest<'a> {
    const SENDER_NAME: &'a str = "Newsletter";

    pub fn single(
        sender: &'a str,
        recipient: &'a str,
        subject: &'a str,
        html_part: &'a str,
        text_part: &'a str,
    ) -> Self {
        Self {
            messages: vec![Message {
                from: Address {
                    email: sender,
                    name: Some(Self::SENDER_NAME),
                },
                to: vec![Address {
                    email: recipient,
                    name: None,
                }],
                subject,
                text_part,
                html_part,
            }],
        }
    }
}
