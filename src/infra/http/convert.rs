//! Mapping between domain resources and the JSON API documents.

use pressroom_api_types::{
    BinaryContentView, ComposerView, ContextView, PageletView, PublishedView, ResourceDocument,
    ResourceKindView, SearchResultDocument, UserRef, VersionView,
};

use crate::domain::resource::{Resource, ResourceBody, ResourceKind, Version};
use crate::domain::user::User;
use crate::search::SearchResult;

pub fn user_ref(user: &User) -> UserRef {
    UserRef {
        id: user.login().to_string(),
        realm: user.realm().to_string(),
        name: user.name().map(str::to_string),
    }
}

pub fn version_view(version: Version) -> VersionView {
    match version {
        Version::Work => VersionView::Work,
        Version::Live => VersionView::Live,
    }
}

pub fn kind_view(kind: ResourceKind) -> ResourceKindView {
    match kind {
        ResourceKind::Page => ResourceKindView::Page,
        ResourceKind::File => ResourceKindView::File,
        ResourceKind::Image => ResourceKindView::Image,
    }
}

pub fn resource_document(resource: &Resource) -> ResourceDocument {
    let (title, composers, content) = match resource.body() {
        ResourceBody::Page(body) => (
            body.title().map(str::to_string),
            body.composers()
                .iter()
                .map(|composer| ComposerView {
                    id: composer.name().to_string(),
                    pagelets: composer
                        .pagelets()
                        .iter()
                        .map(|pagelet| PageletView {
                            module: pagelet.module().to_string(),
                            id: pagelet.id().to_string(),
                            properties: pagelet
                                .properties()
                                .map(|(k, v)| (k.to_string(), v.to_string()))
                                .collect(),
                            elements: pagelet
                                .elements()
                                .map(|(k, v)| (k.to_string(), v.to_string()))
                                .collect(),
                        })
                        .collect(),
                })
                .collect(),
            None,
        ),
        ResourceBody::Binary(binary) => (
            None,
            Vec::new(),
            Some(BinaryContentView {
                filename: binary.filename.clone(),
                mimetype: binary.mimetype.clone(),
                digest: binary.digest.clone(),
                size: binary.size,
            }),
        ),
    };

    ResourceDocument {
        id: resource.id(),
        site: resource.uri().site.clone(),
        path: resource.uri().path.clone(),
        version: version_view(resource.version()),
        kind: kind_view(resource.kind()),
        resource_type: resource.resource_type().map(str::to_string),
        template: resource.template().map(str::to_string),
        subjects: resource.subjects().to_vec(),
        created: ContextView {
            user: resource.created().creator().map(user_ref),
            date: resource.created().date(),
        },
        modified: ContextView {
            user: resource.modified().modifier().map(user_ref),
            date: resource.modified().date(),
        },
        published: resource.published().publisher().map(|publisher| PublishedView {
            user: user_ref(publisher),
            from: resource.published().publish_from(),
            to: resource.published().publish_to(),
        }),
        locked_by: resource.lock_owner().map(user_ref),
        title,
        composers,
        content,
        etag: resource.etag(),
    }
}

pub fn search_result_document(result: &SearchResult) -> SearchResultDocument {
    SearchResultDocument {
        hit_count: result.hit_count,
        offset: result.offset,
        limit: result.limit,
        hits: result
            .hits
            .iter()
            .map(|hit| resource_document(&hit.resource))
            .collect(),
    }
}
