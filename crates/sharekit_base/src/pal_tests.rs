#[cfg(test)]
mod pal_handle_tests {
    use crate::pal::{FilePath, MediaCollection, MediaEntry, MockPal, Pal, PalHandle};
    use std::io::Write;

    #[test]
    fn test_handles_share_one_platform() {
        let mock = MockPal::new();
        let pal1 = PalHandle::new(mock.clone());
        let pal2 = pal1.clone();

        {
            let mut writer = pal1.create_file(&FilePath::from("data/cache/a.txt")).unwrap();
            writer.write_all(b"shared").unwrap();
        }

        assert_eq!(
            pal2.read_file_to_string(&FilePath::from("data/cache/a.txt"))
                .unwrap(),
            "shared"
        );
        assert_eq!(mock.file_count(), 1);
    }

    #[test]
    fn test_handle_usable_from_other_thread() {
        let pal = PalHandle::new(MockPal::new());
        let worker_pal = pal.clone();

        let uri = std::thread::spawn(move || {
            worker_pal
                .insert_media_entry(&MediaEntry::new(MediaCollection::Files).display_name("t.txt"))
                .unwrap()
        })
        .join()
        .unwrap();

        assert_eq!(
            pal.query_display_name(&uri).unwrap().as_deref(),
            Some("t.txt")
        );
    }
}

#[cfg(test)]
mod workflow_tests {
    use crate::pal::{ContentUri, FilePath, MediaCollection, MediaEntry, MockPal, Pal, RealPal};
    use std::io::{Read, Write};

    /// Drives the same insert, write and read sequence against any PAL.
    fn publish_and_read_back(pal: &dyn Pal) -> (ContentUri, Vec<u8>) {
        let uri = pal
            .insert_media_entry(
                &MediaEntry::new(MediaCollection::Files)
                    .display_name("report.pdf")
                    .mime_type(Some("application/pdf".to_string()))
                    .relative_path("Download/Demo"),
            )
            .unwrap();
        {
            let mut writer = pal.open_content_output(&uri).unwrap();
            writer.write_all(b"%PDF-1.7").unwrap();
            writer.flush().unwrap();
        }
        let mut bytes = Vec::new();
        pal.open_content(&uri)
            .unwrap()
            .read_to_end(&mut bytes)
            .unwrap();
        (uri, bytes)
    }

    #[test]
    fn test_mock_and_real_agree() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let real = RealPal::new(temp_dir.path().to_path_buf());
        let mock = MockPal::new();

        let (real_uri, real_bytes) = publish_and_read_back(&real);
        let (mock_uri, mock_bytes) = publish_and_read_back(&mock);

        assert_eq!(real_bytes, mock_bytes);
        assert_eq!(
            real.query_display_name(&real_uri).unwrap(),
            mock.query_display_name(&mock_uri).unwrap()
        );
    }

    #[test]
    fn test_storage_roots() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let real = RealPal::new(temp_dir.path().to_path_buf());
        let mock = MockPal::new();

        for pal in [&real as &dyn Pal, &mock as &dyn Pal] {
            assert_eq!(pal.cache_dir(), FilePath::from("data/cache"));
            assert_eq!(pal.public_downloads_dir(), FilePath::from("storage/Download"));
        }
    }
}
