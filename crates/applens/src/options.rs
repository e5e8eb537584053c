//! Per-request options and the headers they produce

use crate::error::AppLensError;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use uuid::Uuid;

pub const HEADER_PATH_QUERY: &str = "x-ms-path-query";
pub const HEADER_REQUEST_ID: &str = "x-ms-request-id";
pub const HEADER_DATE: &str = "x-ms-date";
pub const HEADER_LOCATION: &str = "x-ms-location";
pub const HEADER_VERSION: &str = "x-ms-version";

const APPLENS_VERSION: &str = "2.0";

/// Options for listing every detector of a cluster
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListDetectorsOptions {
    pub resource_id: String,
    pub location: String,
}

/// Options for fetching one detector
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetDetectorOptions {
    pub resource_id: String,
    pub detector_id: String,
    pub location: String,
}

pub(crate) trait RequestOptions {
    /// ARM path AppLens should resolve
    fn path_query(&self) -> String;

    fn location(&self) -> &str;

    fn to_headers(&self) -> Result<HeaderMap, AppLensError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static(HEADER_VERSION),
            HeaderValue::from_static(APPLENS_VERSION),
        );

        insert(&mut headers, HEADER_PATH_QUERY, &self.path_query())?;
        insert(&mut headers, HEADER_REQUEST_ID, &Uuid::new_v4().to_string())?;
        insert(
            &mut headers,
            HEADER_DATE,
            &Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        )?;
        if !self.location().is_empty() {
            insert(&mut headers, HEADER_LOCATION, self.location())?;
        }

        Ok(headers)
    }
}

impl RequestOptions for ListDetectorsOptions {
    fn path_query(&self) -> String {
        format!("{}/detectors", self.resource_id)
    }

    fn location(&self) -> &str {
        &self.location
    }
}

impl RequestOptions for GetDetectorOptions {
    fn path_query(&self) -> String {
        format!("{}/detectors/{}", self.resource_id, self.detector_id)
    }

    fn location(&self) -> &str {
        &self.location
    }
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) -> Result<(), AppLensError> {
    let value = HeaderValue::from_str(value).map_err(|e| AppLensError::InvalidHeader {
        name: name.to_string(),
        message: e.to_string(),
    })?;
    headers.insert(HeaderName::from_static(name), value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_headers() {
        let options = ListDetectorsOptions {
            resource_id: "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.RedHatOpenShift/openShiftClusters/c".to_string(),
            location: "eastus".to_string(),
        };

        let headers = options.to_headers().unwrap();
        assert_eq!(
            headers[HEADER_PATH_QUERY],
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.RedHatOpenShift/openShiftClusters/c/detectors"
        );
        assert_eq!(headers[HEADER_LOCATION], "eastus");
        assert_eq!(headers[HEADER_VERSION], "2.0");
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert!(Uuid::parse_str(headers[HEADER_REQUEST_ID].to_str().unwrap()).is_ok());
        assert!(headers[HEADER_DATE].to_str().unwrap().ends_with(" GMT"));
    }

    #[test]
    fn test_get_headers_without_location() {
        let options = GetDetectorOptions {
            resource_id: "/subscriptions/sub/c".to_string(),
            detector_id: "apiserver".to_string(),
            location: String::new(),
        };

        let headers = options.to_headers().unwrap();
        assert_eq!(headers[HEADER_PATH_QUERY], "/subscriptions/sub/c/detectors/apiserver");
        assert!(!headers.contains_key(HEADER_LOCATION));
    }

    #[test]
    fn test_invalid_header_value() {
        let options = GetDetectorOptions {
            resource_id: "/subscriptions/sub/c".to_string(),
            detector_id: "bad\ndetector".to_string(),
            location: String::new(),
        };

        let result = options.to_headers();
        assert!(matches!(result, Err(AppLensError::InvalidHeader { .. })));
    }
}
