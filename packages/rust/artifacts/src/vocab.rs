//! RDF vocabulary used across the four graph documents.

pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const OWL: &str = "http://www.w3.org/2002/07/owl#";
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
pub const DCTERMS: &str = "http://purl.org/dc/terms/";
pub const SEM: &str = "http://semanticweb.cs.vu.nl/2009/11/sem/";
pub const NIF: &str = "http://persistence.uni-leipzig.org/nlp2rdf/ontologies/nif-core#";
pub const WGS: &str = "http://www.w3.org/2003/01/geo/wgs84_pos#";
pub const GEO: &str = "http://www.opengis.net/ont/geosparql#";
pub const COY: &str = "https://schema.coypu.org/global#";
pub const WD: &str = "http://www.wikidata.org/entity/";
pub const WDT: &str = "http://www.wikidata.org/prop/direct/";
pub const ITSRDF: &str = "http://www.w3.org/2005/11/its/rdf#";

/// Prefixes written to every JSON-LD `@context`.
pub const PREFIXES: [(&str, &str); 13] = [
    ("rdf", RDF),
    ("rdfs", RDFS),
    ("owl", OWL),
    ("xsd", XSD),
    ("dcterms", DCTERMS),
    ("sem", SEM),
    ("nif", NIF),
    ("wgs", WGS),
    ("geo", GEO),
    ("coy", COY),
    ("wd", WD),
    ("wdt", WDT),
    ("itsrdf", ITSRDF),
];

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
pub const RDFS_SEE_ALSO: &str = "http://www.w3.org/2000/01/rdf-schema#seeAlso";
pub const OWL_SAME_AS: &str = "http://www.w3.org/2002/07/owl#sameAs";
pub const XSD_DATE: &str = "http://www.w3.org/2001/XMLSchema#date";
pub const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
pub const XSD_DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
pub const XSD_TIME: &str = "http://www.w3.org/2001/XMLSchema#time";
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#nonNegativeInteger";
pub const DCTERMS_SOURCE: &str = "http://purl.org/dc/terms/source";
pub const DCTERMS_SUBJECT: &str = "http://purl.org/dc/terms/subject";

pub const SEM_EVENT: &str = "http://semanticweb.cs.vu.nl/2009/11/sem/Event";
pub const SEM_HAS_PLACE: &str = "http://semanticweb.cs.vu.nl/2009/11/sem/hasPlace";
pub const SEM_HAS_TIME_STAMP: &str = "http://semanticweb.cs.vu.nl/2009/11/sem/hasBeginTimeStamp";

pub const NIF_CONTEXT: &str =
    "http://persistence.uni-leipzig.org/nlp2rdf/ontologies/nif-core#Context";
pub const NIF_PHRASE: &str =
    "http://persistence.uni-leipzig.org/nlp2rdf/ontologies/nif-core#Phrase";
pub const NIF_SENTENCE: &str =
    "http://persistence.uni-leipzig.org/nlp2rdf/ontologies/nif-core#Sentence";
pub const NIF_IS_STRING: &str =
    "http://persistence.uni-leipzig.org/nlp2rdf/ontologies/nif-core#isString";
pub const NIF_ANCHOR_OF: &str =
    "http://persistence.uni-leipzig.org/nlp2rdf/ontologies/nif-core#anchorOf";
pub const NIF_BEGIN_INDEX: &str =
    "http://persistence.uni-leipzig.org/nlp2rdf/ontologies/nif-core#beginIndex";
pub const NIF_END_INDEX: &str =
    "http://persistence.uni-leipzig.org/nlp2rdf/ontologies/nif-core#endIndex";
pub const NIF_REFERENCE_CONTEXT: &str =
    "http://persistence.uni-leipzig.org/nlp2rdf/ontologies/nif-core#referenceContext";
pub const ITSRDF_TA_IDENT_REF: &str = "http://www.w3.org/2005/11/its/rdf#taIdentRef";

pub const WGS_POINT: &str = "http://www.w3.org/2003/01/geo/wgs84_pos#Point";
pub const WGS_LAT: &str = "http://www.w3.org/2003/01/geo/wgs84_pos#lat";
pub const WGS_LONG: &str = "http://www.w3.org/2003/01/geo/wgs84_pos#long";
pub const GEO_FEATURE: &str = "http://www.opengis.net/ont/geosparql#Feature";
pub const GEO_HAS_GEOMETRY: &str = "http://www.opengis.net/ont/geosparql#hasGeometry";
pub const GEO_AS_WKT: &str = "http://www.opengis.net/ont/geosparql#asWKT";
pub const GEO_WKT_LITERAL: &str = "http://www.opengis.net/ont/geosparql#wktLiteral";

pub const COY_NEWS_SUMMARY: &str = "https://schema.coypu.org/global#WikiNews";
pub const COY_CATEGORY: &str = "https://schema.coypu.org/global#NewsCategory";
pub const COY_TOPIC: &str = "https://schema.coypu.org/global#NewsTopic";
pub const COY_LOCATION: &str = "https://schema.coypu.org/global#Location";
pub const COY_HAS_CATEGORY: &str = "https://schema.coypu.org/global#hasCategory";
pub const COY_HAS_TOPIC: &str = "https://schema.coypu.org/global#hasParentTopic";
pub const COY_HAS_SENTENCE: &str = "https://schema.coypu.org/global#hasSentence";
pub const COY_HAS_MENTION: &str = "https://schema.coypu.org/global#hasMention";
pub const COY_HAS_ENTITY: &str = "https://schema.coypu.org/global#mentions";
pub const COY_AREA_HINT: &str = "https://schema.coypu.org/global#hasAreaHint";
pub const COY_PLACE_TYPE: &str = "https://schema.coypu.org/global#hasPlaceType";
pub const COY_CONTAINED_IN: &str = "https://schema.coypu.org/global#isContainedIn";
pub const COY_OSM_ID: &str = "https://schema.coypu.org/global#hasOsmId";
pub const COY_OSM_PLACE_ID: &str = "https://schema.coypu.org/global#hasOsmPlaceId";
pub const COY_RAW_HTML: &str = "https://schema.coypu.org/global#hasRawHtml";

pub const COY_ARTICLE: &str = "https://schema.coypu.org/global#WikipediaArticle";
pub const COY_INFOBOX_ROW: &str = "https://schema.coypu.org/global#InfoboxRow";
pub const COY_INFOBOX_ROW_DATE: &str = "https://schema.coypu.org/global#InfoboxRowDate";
pub const COY_INFOBOX_ROW_TIME: &str = "https://schema.coypu.org/global#InfoboxRowTime";
pub const COY_INFOBOX_ROW_LOCATION: &str = "https://schema.coypu.org/global#InfoboxRowLocation";
pub const COY_HAS_ARTICLE: &str = "https://schema.coypu.org/global#hasArticle";
pub const COY_HAS_USAGE_DATE: &str = "https://schema.coypu.org/global#hasUsageDate";
pub const COY_HAS_EVENT_TYPE: &str = "https://schema.coypu.org/global#hasEventType";
pub const COY_HAS_PARENT_LOCATION: &str = "https://schema.coypu.org/global#hasParentLocation";
pub const COY_HAS_REFERENCE: &str = "https://schema.coypu.org/global#hasReference";
pub const COY_HAS_COORDINATES: &str = "https://schema.coypu.org/global#hasCoordinates";
pub const COY_HAS_INFOBOX: &str = "https://schema.coypu.org/global#hasInfobox";
pub const COY_HAS_INFOBOX_ROW: &str = "https://schema.coypu.org/global#hasInfoboxRow";
pub const COY_HAS_VALUE: &str = "https://schema.coypu.org/global#hasValue";
pub const COY_HAS_LINK_AS_VALUE: &str = "https://schema.coypu.org/global#hasLinkAsValue";
pub const COY_HAS_DATE: &str = "https://schema.coypu.org/global#hasDate";
pub const COY_HAS_END_DATE: &str = "https://schema.coypu.org/global#hasEndDate";
pub const COY_HAS_DATE_ONGOING: &str = "https://schema.coypu.org/global#hasDateOngoing";
pub const COY_HAS_TIME: &str = "https://schema.coypu.org/global#hasTime";
pub const COY_HAS_END_TIME: &str = "https://schema.coypu.org/global#hasEndTime";
pub const COY_HAS_TIMEZONE: &str = "https://schema.coypu.org/global#hasTimezone";
pub const COY_HAS_DTSTART: &str = "https://schema.coypu.org/global#hasMicroformatsDtstart";
pub const COY_HAS_DTEND: &str = "https://schema.coypu.org/global#hasMicroformatsDtend";

pub const COY_OSM_ELEMENT: &str = "https://schema.coypu.org/global#OsmElement";
pub const COY_HAS_OSM_ELEMENT_FROM_WIKIDATA: &str =
    "https://schema.coypu.org/global#hasOsmElementFromWikidata";
pub const COY_HAS_OSM_TYPE: &str = "https://schema.coypu.org/global#hasOsmType";
pub const COY_HAS_OSM_WKT: &str = "https://schema.coypu.org/global#hasOsmWkt";
