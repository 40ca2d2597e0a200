use std::fmt::{Debug, Display};
use std::io::Error as IoError;

use derivative::Derivative;
use reqwest::Error as HttpError;
use serde_json::Error as JsonError;

use crate::campaign::CampaignId;

#[derive(Debug, Derivative)]
#[derivative(PartialEq, Eq)]
pub enum Error {
    // validation
    MissingRequiredFields {
        fields: Vec<&'static str>,
    },

    // not found
    CampaignDoesNotExist {
        campaign_id: CampaignId,
    },

    // generation
    MissingGenerationCredential,
    FailedGenerationCall(#[derivative(PartialEq = "ignore")] HttpError),
    GenerationRequestRejected {
        status: u16,
        #[derivative(PartialEq = "ignore")]
        message: String,
    },

    // storage
    FailedStorageCall(#[derivative(PartialEq = "ignore")] IoError),
    FailedToParseSnapshot(#[derivative(PartialEq = "ignore")] JsonError),
    FailedToSerializeSnapshot(#[derivative(PartialEq = "ignore")] JsonError),
}

impl Error {
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::MissingRequiredFields { .. } => "E4001000",
            Error::MissingGenerationCredential => "E4011000",
            Error::CampaignDoesNotExist { .. } => "E4041000",
            Error::FailedStorageCall(_) => "E5001000",
            Error::FailedToParseSnapshot(_) => "E5001001",
            Error::FailedToSerializeSnapshot(_) => "E5001002",
            Error::FailedGenerationCall(_) => "E5021000",
            Error::GenerationRequestRejected { .. } => "E5021001",
        }
    }

    pub fn error_message(&self) -> &'static str {
        match self {
            Error::MissingRequiredFields { .. } => {
                "The given campaign draft is missing required fields"
            }
            Error::MissingGenerationCredential => {
                "No credential is configured for the generation backend"
            }
            Error::CampaignDoesNotExist { .. } => "The requested campaign was not found",
            Error::FailedStorageCall(_) => {
                "An error occurred when accessing the campaign snapshot store"
            }
            Error::FailedToParseSnapshot(_) => {
                "An error occurred when parsing the stored campaign snapshot"
            }
            Error::FailedToSerializeSnapshot(_) => {
                "An error occurred when serializing the campaign snapshot"
            }
            Error::FailedGenerationCall(_) => {
                "An error occurred when communicating with the generation backend"
            }
            Error::GenerationRequestRejected { .. } => {
                "The generation backend rejected the request"
            }
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        Debug::fmt(self, f)
    }
}

impl From<HttpError> for Error {
    fn from(error: HttpError) -> Error {
        Error::FailedGenerationCall(error)
    }
}

impl From<IoError> for Error {
    fn from(error: IoError) -> Error {
        Error::FailedStorageCall(error)
    }
}

impl From<JsonError> for Error {
    fn from(error: JsonError) -> Error {
        Error::FailedToSerializeSnapshot(error)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::FailedGenerationCall(err) => Some(err),
            Error::FailedStorageCall(err) => Some(err),
            Error::FailedToParseSnapshot(err) => Some(err),
            Error::FailedToSerializeSnapshot(err) => Some(err),
            _ => None,
        }
    }
}
