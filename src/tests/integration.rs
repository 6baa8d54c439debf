use crate::{
    ConnectionSettings, Intent, IntentResult, ListTarget, Listing, SelectionCriteria, VcliClient,
    VcliError, VcliResult,
};
use dotenvy::dotenv;

fn setup() -> ConnectionSettings {
    dotenv().ok();
    ConnectionSettings::from_env().expect("VCLI_HOST, VCLI_USERNAME and VCLI_PASSWORD must be set")
}

#[tokio::test]
#[ignore = "requires a running vCenter and environment variables"]
async fn test_integration_login_success() -> VcliResult<()> {
    let client = VcliClient::builder()
        .settings(setup())
        .accept_invalid_certs(true)
        .build()
        .await?;

    client.login().await?;
    assert!(client.is_authenticated().await);
    client.logout().await?;
    assert!(!client.is_authenticated().await);
    Ok(())
}

#[tokio::test]
#[ignore = "requires a running vCenter and environment variables"]
async fn test_integration_login_invalid_credentials() -> VcliResult<()> {
    let settings = setup();
    let client = VcliClient::builder()
        .host(settings.host)?
        .credentials("invalid_user", "invalid_pass")?
        .accept_invalid_certs(true)
        .build()
        .await?;

    let result = client.login().await;
    assert!(matches!(result, Err(VcliError::Authentication(_))));
    Ok(())
}

#[tokio::test]
#[ignore = "requires a running vCenter and environment variables"]
async fn test_integration_list_clusters() -> VcliResult<()> {
    let client = VcliClient::builder()
        .settings(setup())
        .accept_invalid_certs(true)
        .build()
        .await?;

    let result = client
        .execute(Intent::List {
            target: ListTarget::Clusters,
            criteria: SelectionCriteria::all(),
        })
        .await?;
    assert!(matches!(result, IntentResult::Listing(Listing::Clusters(_))));
    client.logout().await?;
    Ok(())
}
