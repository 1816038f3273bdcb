use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use solr_common::crd::SolrCloud;

use super::object_meta;

/// Key of the Solr configuration in the ConfigMap
pub const SOLR_XML_KEY: &str = "solr.xml";

/// `solr.xml` for cloud mode; host, port and ZooKeeper come from the environment
pub const DEFAULT_SOLR_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<solr>
  <solrcloud>
    <str name="host">${host:}</str>
    <int name="hostPort">${hostPort:80}</int>
    <str name="hostContext">${hostContext:solr}</str>
    <bool name="genericCoreNodeNames">${genericCoreNodeNames:true}</bool>
    <int name="zkClientTimeout">${zkClientTimeout:30000}</int>
    <int name="distribUpdateSoTimeout">${distribUpdateSoTimeout:600000}</int>
    <int name="distribUpdateConnTimeout">${distribUpdateConnTimeout:60000}</int>
    <str name="zkCredentialsProvider">${zkCredentialsProvider:org.apache.solr.common.cloud.DefaultZkCredentialsProvider}</str>
    <str name="zkACLProvider">${zkACLProvider:org.apache.solr.common.cloud.DefaultZkACLProvider}</str>
  </solrcloud>
  <shardHandlerFactory name="shardHandlerFactory"
    class="HttpShardHandlerFactory">
    <int name="socketTimeout">${socketTimeout:600000}</int>
    <int name="connTimeout">${connTimeout:60000}</int>
  </shardHandlerFactory>
</solr>
"#;

/// ConfigMap holding `solr.xml`
pub fn generate_config_map(cloud: &SolrCloud) -> ConfigMap {
    let options = cloud.spec.custom_solr_kube_options.config_map_options.as_ref();
    ConfigMap {
        metadata: object_meta(cloud, cloud.config_map_name(), options, &[]),
        data: Some(BTreeMap::from([(
            SOLR_XML_KEY.to_string(),
            DEFAULT_SOLR_XML.to_string(),
        )])),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solr_common::crd::SolrCloudSpec;

    #[test]
    fn config_map_carries_solr_xml() {
        let mut cloud = SolrCloud::new("books", SolrCloudSpec::default());
        cloud.metadata.namespace = Some("search".to_string());
        let cm = generate_config_map(&cloud);

        assert_eq!(cm.metadata.name.as_deref(), Some("books-solrcloud-configmap"));
        let xml = cm.data.unwrap().remove(SOLR_XML_KEY).unwrap();
        assert!(xml.contains("<solrcloud>"));
        assert_eq!(
            cm.metadata.labels.unwrap().get("solr-cloud").map(String::as_str),
            Some("books")
        );
    }
}
